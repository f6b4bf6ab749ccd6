use std::collections::HashMap;

/// Single-character OCR confusions: observed char -> likely true readings.
const SINGLE_CHAR: &[(char, &[&str])] = &[
    ('y', &["r", "v", "n", "g"]),
    ('u', &["a", "o", "n", "ii"]),
    ('z', &["s", "a", "t", "2"]),
    ('t', &["a", "l", "i", "+"]),
    ('l', &["i", "t", "1", "j"]),
    ('i', &["l", "j", "1", "t"]),
    ('o', &["a", "0", "e", "c"]),
    ('n', &["r", "m", "h", "ii"]),
    ('r', &["n", "y", "v"]),
    ('a', &["o", "e", "u"]),
    ('s', &["z", "5", "g"]),
    ('g', &["q", "y", "9"]),
    ('q', &["g", "o", "9"]),
    ('w', &["v", "vv", "ii"]),
    ('v', &["y", "r"]),
    ('e', &["c", "o"]),
    ('c', &["e", "o"]),
    ('m', &["n", "ii", "rn"]),
    ('h', &["n", "ii"]),
    ('j', &["i", "l"]),
    ('f', &["t", "r"]),
    ('p', &["q", "g"]),
    ('b', &["g", "6"]),
    ('d', &["a", "cl"]),
    ('k', &["h", "ii"]),
    ('0', &["o", "d", "q"]),
    ('1', &["l", "i", "t"]),
    ('2', &["z", "a"]),
    ('5', &["s", "g"]),
    ('6', &["g", "b"]),
    ('8', &["b", "s"]),
    ('9', &["g", "q"]),
];

/// Two-character sequences OCR tends to produce for a single glyph (or vice versa).
const DIGRAPHS: &[(&str, &[&str])] = &[
    ("rn", &["m", "n"]),
    ("cl", &["d", "a"]),
    ("ml", &["mon", "mi"]),
    ("ii", &["n", "u", "w"]),
    ("vv", &["w"]),
    ("qu", &["q", "g"]),
    ("ij", &["j", "y"]),
];

/// Common letter pairs that make a reading look plausible.
const BONUS_DIGRAPHS: &[(&str, f64)] = &[
    ("qu", 1.5),
    ("wr", 1.0),
    ("th", 1.0),
    ("ch", 1.0),
    ("sh", 1.0),
];

/// Immutable rule set consumed by [`crate::CorrectionEngine`].
#[derive(Debug, Clone)]
pub struct ConfusionRules {
    single: HashMap<char, Vec<String>>,
    digraphs: HashMap<String, Vec<String>>,
    bonus_digraphs: Vec<(String, f64)>,
    max_single_alternates: usize,
}

impl ConfusionRules {
    pub fn new(
        single: impl IntoIterator<Item = (char, Vec<String>)>,
        digraphs: impl IntoIterator<Item = (String, Vec<String>)>,
        bonus_digraphs: Vec<(String, f64)>,
    ) -> Self {
        Self {
            single: single
                .into_iter()
                .map(|(c, alts)| (c.to_ascii_lowercase(), alts))
                .collect(),
            digraphs: digraphs
                .into_iter()
                .map(|(k, alts)| (k.to_lowercase(), alts))
                .collect(),
            bonus_digraphs,
            max_single_alternates: 3,
        }
    }

    /// The compiled-in tables tuned for the foreclosure site's CAPTCHAs.
    pub fn builtin() -> Self {
        Self::new(
            SINGLE_CHAR
                .iter()
                .map(|(c, alts)| (*c, alts.iter().map(|s| s.to_string()).collect())),
            DIGRAPHS
                .iter()
                .map(|(k, alts)| (k.to_string(), alts.iter().map(|s| s.to_string()).collect())),
            BONUS_DIGRAPHS
                .iter()
                .map(|(k, w)| (k.to_string(), *w))
                .collect(),
        )
    }

    /// No rules at all; every input passes through unchanged.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    pub fn with_max_single_alternates(mut self, n: usize) -> Self {
        self.max_single_alternates = n;
        self
    }

    pub fn single_alternates(&self, c: char) -> &[String] {
        match self.single.get(&c) {
            Some(alts) => &alts[..alts.len().min(self.max_single_alternates)],
            None => &[],
        }
    }

    pub fn digraph_alternates(&self, window: &str) -> &[String] {
        self.digraphs.get(window).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bonus_digraphs(&self) -> &[(String, f64)] {
        &self.bonus_digraphs
    }
}

impl Default for ConfusionRules {
    fn default() -> Self {
        Self::builtin()
    }
}
