//! Space-group symbol lookup.
//!
//! Resolves user-supplied symbols (`"P21"`, `"P 41 21 2"`, `"19"`, `"H3"`)
//! to the full Hermann-Mauguin symbol of the reference setting. Matching
//! ignores whitespace and case, so `"p 43 21 2"` resolves like `"P43212"`.

use std::collections::HashMap;
use std::sync::LazyLock;

/// A space group in a specific setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceGroupInfo {
    /// International Tables number (1..=230).
    pub number: u16,
    /// Full Hermann-Mauguin symbol, space separated.
    pub hm: &'static str,
}

impl SpaceGroupInfo {
    /// Full symbol with whitespace removed, e.g. `P1211`.
    pub fn compact(&self) -> String {
        self.hm.split_whitespace().collect()
    }
}

/// Reference settings in number order.
const REFERENCE_SETTINGS: [&str; 230] = [
    "P 1", "P -1", "P 1 2 1", "P 1 21 1", "C 1 2 1", "P 1 m 1", "P 1 c 1", "C 1 m 1",
    "C 1 c 1", "P 1 2/m 1", "P 1 21/m 1", "C 1 2/m 1", "P 1 2/c 1", "P 1 21/c 1",
    "C 1 2/c 1", "P 2 2 2", "P 2 2 21", "P 21 21 2", "P 21 21 21", "C 2 2 21", "C 2 2 2",
    "F 2 2 2", "I 2 2 2", "I 21 21 21", "P m m 2", "P m c 21", "P c c 2", "P m a 2",
    "P c a 21", "P n c 2", "P m n 21", "P b a 2", "P n a 21", "P n n 2", "C m m 2",
    "C m c 21", "C c c 2", "A m m 2", "A b m 2", "A m a 2", "A b a 2", "F m m 2", "F d d 2",
    "I m m 2", "I b a 2", "I m a 2", "P m m m", "P n n n", "P c c m", "P b a n", "P m m a",
    "P n n a", "P m n a", "P c c a", "P b a m", "P c c n", "P b c m", "P n n m", "P m m n",
    "P b c n", "P b c a", "P n m a", "C m c m", "C m c a", "C m m m", "C c c m", "C m m a",
    "C c c a", "F m m m", "F d d d", "I m m m", "I b a m", "I b c a", "I m m a", "P 4",
    "P 41", "P 42", "P 43", "I 4", "I 41", "P -4", "I -4", "P 4/m", "P 42/m", "P 4/n",
    "P 42/n", "I 4/m", "I 41/a", "P 4 2 2", "P 4 21 2", "P 41 2 2", "P 41 21 2",
    "P 42 2 2", "P 42 21 2", "P 43 2 2", "P 43 21 2", "I 4 2 2", "I 41 2 2", "P 4 m m",
    "P 4 b m", "P 42 c m", "P 42 n m", "P 4 c c", "P 4 n c", "P 42 m c", "P 42 b c",
    "I 4 m m", "I 4 c m", "I 41 m d", "I 41 c d", "P -4 2 m", "P -4 2 c", "P -4 21 m",
    "P -4 21 c", "P -4 m 2", "P -4 c 2", "P -4 b 2", "P -4 n 2", "I -4 m 2", "I -4 c 2",
    "I -4 2 m", "I -4 2 d", "P 4/m m m", "P 4/m c c", "P 4/n b m", "P 4/n n c",
    "P 4/m b m", "P 4/m n c", "P 4/n m m", "P 4/n c c", "P 42/m m c", "P 42/m c m",
    "P 42/n b c", "P 42/n n m", "P 42/m b c", "P 42/m n m", "P 42/n m c", "P 42/n c m",
    "I 4/m m m", "I 4/m c m", "I 41/a m d", "I 41/a c d", "P 3", "P 31", "P 32", "R 3",
    "P -3", "R -3", "P 3 1 2", "P 3 2 1", "P 31 1 2", "P 31 2 1", "P 32 1 2", "P 32 2 1",
    "R 3 2", "P 3 m 1", "P 3 1 m", "P 3 c 1", "P 3 1 c", "R 3 m", "R 3 c", "P -3 1 m",
    "P -3 1 c", "P -3 m 1", "P -3 c 1", "R -3 m", "R -3 c", "P 6", "P 61", "P 65", "P 62",
    "P 64", "P 63", "P -6", "P 6/m", "P 63/m", "P 6 2 2", "P 61 2 2", "P 65 2 2",
    "P 62 2 2", "P 64 2 2", "P 63 2 2", "P 6 m m", "P 6 c c", "P 63 c m", "P 63 m c",
    "P -6 m 2", "P -6 c 2", "P -6 2 m", "P -6 2 c", "P 6/m m m", "P 6/m c c",
    "P 63/m c m", "P 63/m m c", "P 2 3", "F 2 3", "I 2 3", "P 21 3", "I 21 3", "P m -3",
    "P n -3", "F m -3", "F d -3", "I m -3", "P a -3", "I a -3", "P 4 3 2", "P 42 3 2",
    "F 4 3 2", "F 41 3 2", "I 4 3 2", "P 43 3 2", "P 41 3 2", "I 41 3 2", "P -4 3 m",
    "F -4 3 m", "I -4 3 m", "P -4 3 n", "F -4 3 c", "I -4 3 d", "P m -3 m", "P n -3 n",
    "P m -3 n", "P n -3 m", "F m -3 m", "F m -3 c", "F d -3 m", "F d -3 c", "I m -3 m",
    "I a -3 d",
];

/// Non-reference settings that resolve to themselves.
const ALTERNATIVE_SETTINGS: &[(u16, &str)] = &[
    (5, "A 1 2 1"),
    (5, "I 1 2 1"),
    (8, "A 1 m 1"),
    (8, "I 1 m 1"),
    (9, "A 1 n 1"),
    (9, "I 1 a 1"),
    (12, "A 1 2/m 1"),
    (12, "I 1 2/m 1"),
    (15, "A 1 2/n 1"),
    (15, "I 1 2/a 1"),
    (17, "P 21 2 2"),
    (17, "P 2 21 2"),
    (18, "P 21 2 21"),
    (18, "P 2 21 21"),
];

/// Alternative names resolving to a reference setting.
const ALIASES: &[(&str, u16)] = &[
    // Newer glide-plane `e` notation.
    ("A e m 2", 39),
    ("A e a 2", 41),
    ("C m c e", 64),
    ("C m m e", 67),
    ("C c c e", 68),
    // Rhombohedral groups in the hexagonal setting.
    ("H 3", 146),
    ("H -3", 148),
    ("H 3 2", 155),
    ("H 3 m", 160),
    ("H 3 c", 161),
    ("H -3 m", 166),
    ("H -3 c", 167),
];

fn lookup_key(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Short monoclinic symbol: `P 1 21 1` -> `P21`.
fn monoclinic_short(hm: &str) -> Option<String> {
    let parts: Vec<&str> = hm.split_whitespace().collect();
    match parts.as_slice() {
        [lattice, "1", axis, "1"] => Some(format!("{lattice}{axis}")),
        _ => None,
    }
}

static BY_NAME: LazyLock<HashMap<String, SpaceGroupInfo>> = LazyLock::new(|| {
    let mut table = HashMap::new();
    let reference = REFERENCE_SETTINGS
        .iter()
        .enumerate()
        .map(|(i, hm)| SpaceGroupInfo { number: i as u16 + 1, hm });

    // Alternatives first so that reference settings win short-symbol clashes.
    let alternatives = ALTERNATIVE_SETTINGS
        .iter()
        .map(|&(number, hm)| SpaceGroupInfo { number, hm });

    for info in alternatives.chain(reference) {
        table.insert(lookup_key(info.hm), info);
        if let Some(short) = monoclinic_short(info.hm) {
            table.insert(lookup_key(&short), info);
        }
        table.insert(lookup_key(&format!("{}:H", info.hm)), info);
    }
    for &(alias, number) in ALIASES {
        if let Some(info) = by_number(number) {
            table.insert(lookup_key(alias), info);
        }
    }
    table
});

/// Reference setting for an International Tables number.
pub fn by_number(number: u16) -> Option<SpaceGroupInfo> {
    let index = usize::from(number).checked_sub(1)?;
    REFERENCE_SETTINGS
        .get(index)
        .map(|hm| SpaceGroupInfo { number, hm })
}

/// Resolve a symbol or number string to a space group.
pub fn find(symbol: &str) -> Option<SpaceGroupInfo> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse().ok().and_then(by_number);
    }
    BY_NAME.get(&lookup_key(trimmed)).copied()
}
