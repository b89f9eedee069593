/// Render a human-friendly file size string.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < MIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{:.1} MB", value / MIB)
    }
}

/// Turn an identifier like `glow-radio` into a display name like `Glow Radio`.
#[must_use]
pub fn title_case(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape text for inclusion in generated HTML listings.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_size_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2_048), "2.0 KB");
        assert_eq!(format_size(5_242_880), "5.0 MB");
    }

    #[test]
    fn title_cases_identifiers() {
        assert_eq!(title_case("glow-radio"), "Glow Radio");
        assert_eq!(title_case("akan-wise-saying"), "Akan Wise Saying");
        assert_eq!(title_case("xowars"), "Xowars");
        assert_eq!(title_case("star_script--editor"), "Star Script Editor");
        assert_eq!(title_case("ABC-def"), "Abc Def");
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }
}
