use regex::Regex;

/// Institution-type words. Capitalized wherever they appear.
pub const BUILDING_KEYWORDS: &[&str] = &[
    "school", "college", "university", "institute", "hall", "center", "centre",
    "complex", "stadium", "hospital", "clinic", "dispensary", "office", "bank",
    "library", "museum", "theater", "theatre", "cinema", "mall", "market",
    "bazaar", "station", "terminal", "airport", "port", "depot", "headquarters",
    "hq", "ministry", "department", "authority", "agency", "committee", "commission",
    "council", "board", "academy", "institution", "association", "society",
    "foundation", "trust", "corporation", "company", "enterprise", "store",
    "shop", "boutique", "outlet", "showroom", "gallery", "studio", "court",
    "tribunal", "judiciary", "temple", "church", "mosque", "monastery", "shrine",
    "parliament", "assembly", "secretariat", "directorate", "pavilion",
    "auditorium", "gymnasium", "aquarium", "planetarium", "observatory",
    "laboratory", "workshop", "factory", "mill", "refinery", "distillery",
    "brewery", "winery", "bakery", "restaurant", "cafe", "canteen", "hostel",
    "dormitory", "residence", "apartment", "flat", "bungalow", "villa", "palace",
    "fort", "castle", "tower", "mansion", "cottage", "farm", "estate", "garden",
    "park", "playground", "zoo", "sanctuary", "reserve", "panchayat", "hotel",
];

/// Institution words that, as whole words after a leading number, make a
/// line a header. Narrower than `BUILDING_KEYWORDS`, whose street and place
/// words ("station", "market", "park") also show up in section lines.
pub const HEADER_BUILDINGS: &[&str] = &[
    "hall", "center", "centre", "office", "panchayat", "dispensary", "hospital",
    "library", "college",
];

/// Phrase corrections, applied top to bottom. Order matters: the multi-word
/// school phrases run before the abbreviation expansions, and `govt.` /
/// `sec.` must run before their bare forms.
pub const CORRECTIONS: &[(&str, &str)] = &[
    ("polling station", "Polling Station"),
    ("primary school", "Primary School"),
    ("secondary school", "Secondary School"),
    ("high school", "High School"),
    ("government school", "Government School"),
    ("govt.", "Government"),
    ("govt", "Government"),
    ("sr.", "Senior"),
    ("sr", "Senior"),
    ("sec.", "Secondary"),
    ("sec", "Secondary"),
    ("community hall", "Community Hall"),
    ("village panchayat", "Village Panchayat"),
    ("panchayat ghar", "Panchayat Ghar"),
    ("anganwadi center", "Anganwadi Center"),
    ("junior high school", "Junior High School"),
    ("middle school", "Middle School"),
    ("municipal council", "Municipal Council"),
    ("gram panchayat", "Gram Panchayat"),
];

/// Substrings that mark the text after a leading number as a polling-station
/// header. Matched against the lowercased remainder of the line.
pub const STATION_INDICATORS: &[&str] = &[
    // schools
    "school", "vidyalaya", "pathshala",
    // ownership
    "government", "govt", "sarkari",
    "private", "pvt",
    // school types and levels
    "primary", "middle", "high", "sr. sec", "c.sec", "c.secondary", "s.s.s.school", "el.", "gau.eli",
    // named entities
    "rigging and plant reaction sub dvt", "dvt",
    "s.middle", "s.pr.school", "s.p. school", "s.e.school",
    "shaheed captain arun singh jasrotia",
    "harijan dharamshala", "dharamshala",
    "lajpat rai", "m.s.d.rajput", "smsd rajput",
];

/// Immutable word tables injected into the normalizer and the extractor.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub building_keywords: Vec<String>,
    pub corrections: Vec<(String, String)>,
    pub station_indicators: Vec<String>,
    pub header_buildings: Vec<String>,
}

impl Vocabulary {
    pub fn builtin() -> Self {
        Vocabulary {
            building_keywords: BUILDING_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            corrections: CORRECTIONS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            station_indicators: STATION_INDICATORS.iter().map(|s| s.to_string()).collect(),
            header_buildings: HEADER_BUILDINGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Case-insensitive whole-word matcher for any of `words`, longest first.
/// `None` when there is nothing to match.
pub fn keyword_regex(words: &[String]) -> Result<Option<Regex>, regex::Error> {
    let mut words: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return Ok(None);
    }
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).map(Some)
}
