//! Object name sanitizing

/// Accented letters folded to their ASCII base (Latin-1 and Vietnamese)
const FOLDS: &[(&str, char)] = &[
    ("àáạảãâầấậẩẫăằắặẳẵäåā", 'a'),
    ("èéẹẻẽêềếệểễëē", 'e'),
    ("ìíịỉĩîïī", 'i'),
    ("òóọỏõôồốộổỗơờớợởỡöøō", 'o'),
    ("ùúụủũưừứựửữûüū", 'u'),
    ("ỳýỵỷỹÿ", 'y'),
    ("đ", 'd'),
    ("ç", 'c'),
    ("ñ", 'n'),
    ("ÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴÄÅĀ", 'A'),
    ("ÈÉẸẺẼÊỀẾỆỂỄËĒ", 'E'),
    ("ÌÍỊỈĨÎÏĪ", 'I'),
    ("ÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠÖØŌ", 'O'),
    ("ÙÚỤỦŨƯỪỨỰỬỮÛÜŪ", 'U'),
    ("ỲÝỴỶỸ", 'Y'),
    ("Đ", 'D'),
    ("Ç", 'C'),
    ("Ñ", 'N'),
];

fn fold(c: char) -> char {
    FOLDS
        .iter()
        .find(|(set, _)| set.contains(c))
        .map_or(c, |(_, base)| *base)
}

/// Make a file name safe for object storage
///
/// Folds diacritics, turns whitespace runs into `-`, drops anything
/// outside `[A-Za-z0-9._-]`, collapses repeated `-` and trims `-` from
/// both ends.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars().map(fold) {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            if c == '-' && out.ends_with('-') {
                continue;
            }
            out.push(c);
        }
    }

    // Dropped characters can leave adjacent dashes behind
    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches('-').to_string()
}

/// Sanitize only the last component of an object path
pub fn sanitize_object_path(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((folder, name)) => format!("{}/{}", folder, sanitize_file_name(name)),
        None => sanitize_file_name(path),
    }
}
