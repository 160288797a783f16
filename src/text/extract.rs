use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::vocab::{keyword_regex, Vocabulary};

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(.*)$").unwrap());
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\s*:\s*.*").unwrap());

/// Column headers at the tabular export boundary.
pub const EXPORT_COLUMNS: [&str; 3] = [
    "Polling Station Number",
    "Building and Address",
    "Sections Covered",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollingStationRecord {
    pub number: String,
    pub address: String,
    pub sections: Vec<String>,
}

impl PollingStationRecord {
    pub fn sections_text(&self) -> String {
        self.sections.join("\n")
    }

    /// Cells in `EXPORT_COLUMNS` order.
    pub fn to_row(&self) -> [String; 3] {
        [self.number.clone(), self.address.clone(), self.sections_text()]
    }
}

/// How a single trimmed line reads.
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    Header { number: &'a str, rest: &'a str },
    Detail(&'a str),
}

/// Open record while scanning.
#[derive(Debug)]
struct Draft {
    number: String,
    address: String,
    sections: Vec<String>,
}

impl Draft {
    fn open(number: &str, rest: &str) -> Self {
        let rest = rest.trim();
        let mut draft = Draft {
            number: number.to_string(),
            address: rest.to_string(),
            sections: Vec::new(),
        };
        if let Some(m) = SECTION_RE.find(rest) {
            draft.address = rest[..m.start()].trim().to_string();
            let first = m.as_str().trim();
            if !first.is_empty() {
                draft.sections.push(first.to_string());
            }
        }
        draft
    }

    /// A draft without any section lines is dropped.
    fn finish(self) -> Option<PollingStationRecord> {
        if self.sections.is_empty() {
            debug!(number = %self.number, address = %self.address, "dropping header without sections");
            return None;
        }
        Some(PollingStationRecord {
            number: self.number,
            address: self.address,
            sections: self.sections,
        })
    }
}

/// Line-oriented record extraction over normalized translated text.
#[derive(Debug, Clone)]
pub struct Extractor {
    indicators: Vec<String>,
    building_re: Option<Regex>,
}

impl Extractor {
    pub fn new(vocab: &Vocabulary) -> Result<Self, regex::Error> {
        Ok(Extractor {
            indicators: vocab
                .station_indicators
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase())
                .collect(),
            building_re: keyword_regex(&vocab.header_buildings)?,
        })
    }

    /// Whether the text after a leading number names a polling station.
    pub fn names_station(&self, rest: &str) -> bool {
        let lower = rest.trim().to_lowercase();
        self.indicators.iter().any(|kw| lower.contains(kw.as_str()))
            || self.building_re.as_ref().is_some_and(|re| re.is_match(&lower))
    }

    pub fn classify<'a>(&self, line: &'a str) -> Line<'a> {
        if let Some(caps) = HEADER_RE.captures(line) {
            let (Some(number), Some(rest)) = (caps.get(1), caps.get(2)) else {
                return Line::Detail(line);
            };
            if self.names_station(rest.as_str()) {
                return Line::Header {
                    number: number.as_str(),
                    rest: rest.as_str(),
                };
            }
        }
        Line::Detail(line)
    }

    /// Records in the order their headers appear. Lines before the first
    /// header are ignored.
    pub fn extract(&self, text: &str) -> Vec<PollingStationRecord> {
        let mut records = Vec::new();
        let mut draft: Option<Draft> = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.classify(line) {
                Line::Header { number, rest } => {
                    if let Some(record) = draft.take().and_then(Draft::finish) {
                        records.push(record);
                    }
                    draft = Some(Draft::open(number, rest));
                }
                Line::Detail(detail) => match draft.as_mut() {
                    Some(open) => open.sections.push(detail.to_string()),
                    None => debug!(line = detail, "skipping line before first header"),
                },
            }
        }

        if let Some(record) = draft.and_then(Draft::finish) {
            records.push(record);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(&Vocabulary::builtin()).unwrap()
    }

    #[test]
    fn header_with_inline_section() {
        let records = extractor().extract("1 Govt Primary School Majra 1: Village Majra Part A");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].number, "1");
        assert_eq!(records[0].address, "Govt Primary School Majra");
        assert_eq!(records[0].sections, vec!["1: Village Majra Part A"]);
    }

    #[test]
    fn header_without_sections_is_dropped() {
        let text = "1 Govt School Alpha\n2 Govt School Beta\n1: Village Beta";
        let records = extractor().extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].number, "2");
        assert_eq!(records[0].address, "Govt School Beta");
    }

    #[test]
    fn trailing_header_without_sections_is_dropped() {
        let text = "1 Govt School Alpha\n1: Village Alpha\n2 Govt School Beta";
        let records = extractor().extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].number, "1");
    }

    #[test]
    fn building_keyword_makes_a_header() {
        let records = extractor().extract("5 Community Hall\nArea 1: North block");
        assert_eq!(
            records,
            vec![PollingStationRecord {
                number: "5".to_string(),
                address: "Community Hall".to_string(),
                sections: vec!["Area 1: North block".to_string()],
            }]
        );
    }

    #[test]
    fn numbered_line_without_keyword_is_a_section() {
        let text = "7 Govt Middle School Kalan\n12 Ward Kalan East\n13 Ward Kalan West";
        let records = extractor().extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sections, vec!["12 Ward Kalan East", "13 Ward Kalan West"]);
    }

    #[test]
    fn street_and_place_words_stay_in_sections() {
        let text = "7 Govt Middle School Kalan\n12 Ward near Bus Station\n13 Old Market Park Road";
        let records = extractor().extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sections, vec!["12 Ward near Bus Station", "13 Old Market Park Road"]);
    }

    #[test]
    fn panchayat_building_opens_a_header() {
        let records = extractor().extract("3 Panchayat Ghar Kalan\n1: Village Kalan");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, "Panchayat Ghar Kalan");
    }

    #[test]
    fn preamble_is_ignored() {
        let text = "Electoral roll 2024\nDistrict Ludhiana\n3 Sarkari Pathshala\n1: Village Dhaka";
        let records = extractor().extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].number, "3");
    }

    #[test]
    fn no_header_yields_no_records() {
        assert!(extractor().extract("").is_empty());
        assert!(extractor().extract("just some translated prose\nwith no numbers").is_empty());
    }

    #[test]
    fn duplicate_numbers_are_kept_in_order() {
        let text = "4 Govt School A\n1: X\n4 Govt School B\n1: Y";
        let addresses: Vec<_> = extractor().extract(text).into_iter().map(|r| r.address).collect();
        assert_eq!(addresses, vec!["Govt School A", "Govt School B"]);
    }

    #[test]
    fn injected_vocabulary_replaces_builtin() {
        let vocab = Vocabulary {
            building_keywords: vec![],
            corrections: vec![],
            station_indicators: vec!["gurdwara".to_string()],
            header_buildings: vec![],
        };
        let ex = Extractor::new(&vocab).unwrap();
        let records = ex.extract("9 Gurdwara Sahib\n1: Mohalla A\n10 Govt School\n1: Mohalla B");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sections, vec!["1: Mohalla A", "10 Govt School", "1: Mohalla B"]);
    }

    #[test]
    fn export_row_joins_sections() {
        let record = PollingStationRecord {
            number: "2".to_string(),
            address: "Govt School".to_string(),
            sections: vec!["1: A".to_string(), "2: B".to_string()],
        };
        assert_eq!(record.to_row(), ["2".to_string(), "Govt School".to_string(), "1: A\n2: B".to_string()]);
    }

    #[test]
    fn majra_fixture() {
        let text = std::fs::read_to_string("tests/fixtures/ac_majra.txt").unwrap();
        let ex = extractor();
        let records = ex.extract(&text);
        assert_eq!(ex.extract(&text), records);

        let numbers: Vec<&str> = records.iter().map(|r| r.number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "2", "4", "5"]);

        assert_eq!(records[0].address, "Government Primary School Majra (East Wing)");
        assert_eq!(records[0].sections, vec!["1: Village Majra Ward No. 1", "2: Village Majra Ward No. 2"]);
        assert_eq!(records[1].address, "Government Senior Secondary School Majra (West Wing)");
        assert_eq!(records[1].sections.len(), 2);
        assert_eq!(records[2].address, "Dharamshala Khurd");
        assert_eq!(records[3].sections_text(), "Area 1: North block\nArea 2: South block, Near Canal");
    }
}
