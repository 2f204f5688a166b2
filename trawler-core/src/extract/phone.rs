use super::{ContactExtractor, ContactKind, ExtractError, PageContent};
use phonenumber::country::Id;
use phonenumber::Mode;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // international
        r"\+?\d{1,3}[\s\-]?\d{1,4}[\s\-]?\d{1,4}[\s\-]?\d{1,4}",
        // NANP
        r"\(?\d{3}\)?[\s\-]?\d{3}[\s\-]?\d{4}",
        // extension suffix
        r"(?i)\d{3}[\s\-.]?\d{3}[\s\-.]?\d{4}\s*(?:x|ext|extension)\.?\s*\d{2,5}",
        // toll free
        r"\b(?:800|888|877|866|855|844|833|822)[\s\-.]?\d{3}[\s\-.]?\d{4}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static phone pattern"))
    .collect()
});

static TEL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)tel:([^"'\s>]+)"#).expect("static tel pattern"));

static DATA_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)data-phone="([^"]+)""#).expect("static data-phone pattern"));

const PLACEHOLDER_NUMBERS: &[&str] = &[
    "1234567890",
    "0000000000",
    "1111111111",
    "9999999999",
    "0123456789",
    "1000000000",
    "2000000000",
];

/// Regions tried after the page's own, in order.
const ALTERNATE_REGIONS: [Id; 9] = [
    Id::US,
    Id::GB,
    Id::CA,
    Id::AU,
    Id::IN,
    Id::DE,
    Id::FR,
    Id::BR,
    Id::CN,
];

pub const DEFAULT_REGION: Id = Id::US;

#[derive(Debug, Default, Clone, Copy)]
pub struct PhoneExtractor;

impl ContactExtractor for PhoneExtractor {
    fn kind(&self) -> ContactKind {
        ContactKind::Phone
    }

    fn extract(&self, page: &PageContent) -> Result<HashSet<String>, ExtractError> {
        let region = region_for_url(&page.url);
        let mut candidates = text_candidates(&page.text);
        candidates.extend(attribute_candidates(&page.html));
        Ok(normalize_all(candidates, region))
    }
}

/// Phone numbers in `content`, E.164 where a region validates them.
pub fn extract_phones(content: &str, region: Id) -> HashSet<String> {
    let mut candidates = text_candidates(content);
    candidates.extend(attribute_candidates(content));
    normalize_all(candidates, region)
}

/// Presumed region from the URL's country-code TLD.
pub fn region_for_url(url: &str) -> Id {
    let tld = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().and_then(|h| h.rsplit('.').next().map(str::to_lowercase)));

    match tld.as_deref() {
        Some("uk") => Id::GB,
        Some("ca") => Id::CA,
        Some("au") => Id::AU,
        Some("in") => Id::IN,
        Some("de") => Id::DE,
        Some("fr") => Id::FR,
        Some("br") => Id::BR,
        Some("cn") => Id::CN,
        Some("ie") => Id::IE,
        Some("nz") => Id::NZ,
        Some("es") => Id::ES,
        Some("it") => Id::IT,
        Some("nl") => Id::NL,
        _ => DEFAULT_REGION,
    }
}

/// (raw match, cleaned digits)
type Candidate = (String, String);

fn text_candidates(text: &str) -> Vec<Candidate> {
    let mut spans: Vec<(usize, usize)> = PHONE_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.find_iter(text))
        .filter(|m| !inside_digit_run(text, m.start(), m.end()))
        .map(|m| (m.start(), m.end()))
        .collect();
    spans.sort_unstable();
    spans.dedup();

    // A shape matched inside a longer match is a fragment of that number
    let outermost: Vec<(usize, usize)> = spans
        .iter()
        .copied()
        .filter(|&(start, end)| {
            !spans
                .iter()
                .any(|&(s, e)| s <= start && end <= e && (e - s) > (end - start))
        })
        .collect();

    outermost
        .into_iter()
        .filter_map(|(start, end)| {
            let raw = &text[start..end];
            let cleaned = clean_phone(raw);
            (has_valid_length(&cleaned) && !is_placeholder(&cleaned) && !looks_like_years(raw))
                .then(|| (raw.to_string(), cleaned))
        })
        .collect()
}

/// "2010 2015 2020": two or more bare four-digit groups, each a plausible year.
fn looks_like_years(raw: &str) -> bool {
    if raw.contains('+') {
        return false;
    }
    let groups: Vec<&str> = raw
        .split(|c: char| !c.is_ascii_digit())
        .filter(|group| !group.is_empty())
        .collect();

    groups.len() >= 2
        && groups.iter().all(|group| {
            group.len() == 4 && group.parse::<u16>().is_ok_and(|year| (1900..=2099).contains(&year))
        })
}

fn inside_digit_run(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(|c| c.is_ascii_digit() || c == '+') || after.is_some_and(|c| c.is_ascii_digit())
}

fn attribute_candidates(html: &str) -> Vec<Candidate> {
    TEL_LINK
        .captures_iter(html)
        .chain(DATA_PHONE.captures_iter(html))
        .filter_map(|captures| {
            let raw = captures[1].to_string();
            let cleaned = clean_phone(&raw);
            (has_valid_length(&cleaned) && !is_placeholder(&cleaned)).then_some((raw, cleaned))
        })
        .collect()
}

fn normalize_all(candidates: Vec<Candidate>, region: Id) -> HashSet<String> {
    candidates
        .into_iter()
        .map(|(raw, cleaned)| normalize(&raw, region).unwrap_or(cleaned))
        .filter(|phone| !phone.is_empty())
        .collect()
}

/// E.164 form of `raw`, trying `region` first and then the alternates.
pub fn normalize(raw: &str, region: Id) -> Option<String> {
    std::iter::once(region)
        .chain(ALTERNATE_REGIONS.into_iter().filter(|r| *r != region))
        .find_map(|r| {
            phonenumber::parse(Some(r), raw)
                .ok()
                .filter(phonenumber::is_valid)
                .map(|number| number.format().mode(Mode::E164).to_string())
        })
}

/// Keep digits and `+`, then drop leading zeros (with any `+` in front of them).
pub fn clean_phone(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    match kept.strip_prefix('+') {
        Some(rest) if rest.starts_with('0') => rest.trim_start_matches('0').to_string(),
        Some(_) => kept,
        None => kept.trim_start_matches('0').to_string(),
    }
}

fn digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

fn has_valid_length(phone: &str) -> bool {
    (7..=15).contains(&digits(phone).len())
}

fn is_placeholder(phone: &str) -> bool {
    let digits = digits(phone);
    let mut chars = digits.chars();
    let all_same = match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => true,
    };

    all_same
        || PLACEHOLDER_NUMBERS.contains(&digits.as_str())
        || "01234567890123456789".contains(digits.as_str())
        || digits.starts_with("123")
        || digits.starts_with("555")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanp_number_normalized_once() {
        let phones = extract_phones("call (212) 565-0000", DEFAULT_REGION);
        assert_eq!(phones.len(), 1);
        assert!(phones.contains("+12125650000"));
    }

    #[test]
    fn test_fictional_nanp_number_normalized() {
        let phones = extract_phones("call (212) 555-0182", DEFAULT_REGION);
        assert_eq!(phones.len(), 1);
        assert!(phones.contains("+12125550182"));
    }

    #[test]
    fn test_runs_of_years_are_not_numbers() {
        assert!(extract_phones("Founded 2010 2015 2020 2024", DEFAULT_REGION).is_empty());
        assert!(extract_phones("Awards: 1998-2004-2011", DEFAULT_REGION).is_empty());
        assert!(looks_like_years("2010 2015 2020"));
        assert!(!looks_like_years("+49 2010 2015 2020"));
        assert!(!looks_like_years("2125 5501 82"));
    }

    #[test]
    fn test_international_and_local_forms_collapse() {
        let phones = extract_phones("Tel +1 212 565 0000 or (212) 565-0000", DEFAULT_REGION);
        assert_eq!(phones.len(), 1);
    }

    #[test]
    fn test_tel_links() {
        let phones = extract_phones(r#"<a href="tel:+442071838750">Call</a>"#, DEFAULT_REGION);
        assert!(phones.contains("+442071838750"));
    }

    #[test]
    fn test_data_phone_attribute() {
        let phones = extract_phones(r#"<span data-phone="+61 2 9374 4000"></span>"#, DEFAULT_REGION);
        assert!(phones.contains("+61293744000"));
    }

    #[test]
    fn test_placeholders_rejected() {
        assert!(is_placeholder("1234567890"));
        assert!(is_placeholder("7777777"));
        assert!(is_placeholder("3456789"));
        assert!(is_placeholder("5551234"));
        assert!(!is_placeholder("2125550182"));

        let phones = extract_phones("000-000-0000 and 111 111 1111", DEFAULT_REGION);
        assert!(phones.is_empty());
    }

    #[test]
    fn test_length_bounds() {
        assert!(!has_valid_length("12345"));
        assert!(has_valid_length("2125550"));
        assert!(!has_valid_length("1234567890123456"));
    }

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone("+1 (212) 555-0182"), "+12125550182");
        assert_eq!(clean_phone("0044 20 7183 8750"), "442071838750");
        assert_eq!(clean_phone("+0044207"), "44207");
    }

    #[test]
    fn test_region_from_url() {
        assert_eq!(region_for_url("https://shop.example.co.uk/contact"), Id::GB);
        assert_eq!(region_for_url("https://firma.de"), Id::DE);
        assert_eq!(region_for_url("https://example.com"), Id::US);
        assert_eq!(region_for_url("garbage"), Id::US);
    }

    #[test]
    fn test_page_region_is_tried_first() {
        // 020 7183 8750 is a London number, not valid in the US plan
        assert_eq!(
            normalize("020 7183 8750", Id::GB).as_deref(),
            Some("+442071838750")
        );
    }

    #[test]
    fn test_extractor_reads_text_and_attributes() {
        let page = PageContent::parse(
            "https://example.com/contact",
            r#"<html><body><p>Office: (415) 867-5309</p><a href="tel:+14158675310">Support</a></body></html>"#,
        );
        let phones = PhoneExtractor.extract(&page).unwrap();
        assert!(phones.contains("+14158675309"));
        assert!(phones.contains("+14158675310"));
    }
}
