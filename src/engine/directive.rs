// src/engine/directive.rs
//
// Directive parsing: `...?tr=w-300,h-200,cm-pad_resize` -> ordered key/value
// pairs -> typed TransformRequest.
//
// Nothing in here returns an error. Unknown keys, tokens without a value and
// values that do not parse are dropped and the previous (or default) value
// stands.

use crate::ops::{
    AspectRatio, CropMode, CropStrategy, FocusSide, RequestedFormat, Rgb, TransformKey,
};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::debug;

/// Query parameter carrying the directive.
pub const TRANSFORMATION_PARAMETER: &str = "tr";
/// Separates tokens inside the directive.
pub const TRANSFORM_DELIMITER: char = ',';
/// Separates a short key from its value. Aspect ratios reuse it (`ar-16-9`).
pub const TRANSFORM_KEY_VALUE_DELIMITER: char = '-';

pub const DEFAULT_QUALITY: u8 = 90;

/// Ordered `(key, raw value)` pairs as they appeared on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Directive {
    entries: Vec<(TransformKey, String)>,
}

impl Directive {
    /// Parse the value of a `tr=` parameter (already percent-decoded).
    pub fn parse(value: &str) -> Self {
        let entries = value
            .split(TRANSFORM_DELIMITER)
            .filter_map(|token| {
                let (short_key, raw) = token.split_once(TRANSFORM_KEY_VALUE_DELIMITER)?;
                match TransformKey::from_short_key(short_key.trim()) {
                    Some(key) => Some((key, raw.to_string())),
                    None => {
                        debug!(token, "skipping unknown directive key");
                        None
                    }
                }
            })
            .collect();
        Self { entries }
    }

    /// Locate the first `tr=` parameter of a URL and parse it.
    /// URLs without one yield an empty directive.
    pub fn from_url(url: &str) -> Self {
        extract_directive_value(url)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &[(TransformKey, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last raw value for `key`.
    pub fn get(&self, key: TransformKey) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Canonical-name keyed view with last-wins semantics.
    pub fn params(&self) -> BTreeMap<TransformKey, String> {
        let mut params = BTreeMap::new();
        for (key, value) in &self.entries {
            params.insert(*key, value.clone());
        }
        params
    }
}

/// Return the percent-decoded value of the first `tr` parameter in `url`.
pub fn extract_directive_value(url: &str) -> Option<String> {
    let query = match url.find('?') {
        Some(pos) => &url[pos + 1..],
        // Directives are sometimes appended with '&' and no '?' at all
        None => url,
    };
    query
        .split('&')
        .filter(|param| !param.is_empty())
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key == TRANSFORMATION_PARAMETER).then(|| percent_decode(value).into_owned())
        })
}

/// Percent-decode a URL component. Also handles '+' as space.
pub(crate) fn percent_decode(s: &str) -> Cow<'_, str> {
    if !s.bytes().any(|b| b == b'%' || b == b'+') {
        return Cow::Borrowed(s);
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Leading decimal digits of `value`, e.g. `"300px"` -> 300. `None` when there are none.
fn parse_leading_int(value: &str) -> Option<u64> {
    let value = value.trim();
    let digits = value
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| &value[..=i])?;
    // Saturate absurdly long inputs instead of rejecting them
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}

fn parse_dimension(value: &str) -> Option<u32> {
    parse_leading_int(value)
        .filter(|v| *v > 0)
        .map(|v| v.min(u32::MAX as u64) as u32)
}

fn parse_quality(value: &str) -> Option<u8> {
    parse_leading_int(value).map(|v| v.min(100) as u8)
}

/// Typed view of a directive with defaults applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransformRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub aspect_ratio: Option<AspectRatio>,
    pub quality: u8,
    pub crop: Option<CropStrategy>,
    pub crop_mode: CropMode,
    pub focus: FocusSide,
    pub format: RequestedFormat,
    pub background: Rgb,
}

impl Default for TransformRequest {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            aspect_ratio: None,
            quality: DEFAULT_QUALITY,
            crop: None,
            crop_mode: CropMode::None,
            focus: FocusSide::None,
            format: RequestedFormat::Auto,
            background: Rgb::DEFAULT_BACKGROUND,
        }
    }
}

impl TransformRequest {
    pub fn from_url(url: &str) -> Self {
        Self::from_directive(&Directive::from_url(url))
    }

    pub fn from_directive(directive: &Directive) -> Self {
        Self::default().merged(directive)
    }

    /// Apply `directive` on top of `self`. Each valid value overwrites the
    /// current one; invalid values leave it untouched.
    pub fn merged(mut self, directive: &Directive) -> Self {
        for (key, value) in directive.entries() {
            let value = value.as_str();
            let applied = match key {
                TransformKey::Width => parse_dimension(value).map(|w| self.width = Some(w)),
                TransformKey::Height => parse_dimension(value).map(|h| self.height = Some(h)),
                TransformKey::AspectRatio => match AspectRatio::parse(value) {
                    Ok(ratio) => Some(self.aspect_ratio = Some(ratio)),
                    Err(err) => {
                        debug!(error = %err, "ignoring aspect ratio");
                        None
                    }
                },
                TransformKey::Quality => parse_quality(value).map(|q| self.quality = q),
                TransformKey::Crop => CropStrategy::parse(value).map(|c| self.crop = Some(c)),
                TransformKey::CropMode => CropMode::parse(value).map(|m| self.crop_mode = m),
                TransformKey::Focus => Some(self.focus = FocusSide::parse(value)),
                TransformKey::Format => RequestedFormat::parse(value).map(|f| self.format = f),
                TransformKey::Background => Rgb::parse_hex(value).map(|bg| self.background = bg),
            };
            if applied.is_none() && *key != TransformKey::AspectRatio {
                debug!(key = %key, value, "ignoring invalid directive value");
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_directive() {
        let d = Directive::from_url(
            "https://cdn.example.com/img/cat.jpg?tr=w-300,h-200,cm-pad_resize,fo-left,bg-ffffff,q-80,f-auto",
        );
        let params = d.params();
        assert_eq!(params.len(), 7);
        assert_eq!(params[&TransformKey::Width], "300");
        assert_eq!(params[&TransformKey::Height], "200");
        assert_eq!(params[&TransformKey::CropMode], "pad_resize");
        assert_eq!(params[&TransformKey::Focus], "left");
        assert_eq!(params[&TransformKey::Background], "ffffff");
        assert_eq!(params[&TransformKey::Quality], "80");
        assert_eq!(params[&TransformKey::Format], "auto");
    }

    #[test]
    fn aspect_ratio_keeps_everything_after_first_delimiter() {
        let d = Directive::parse("w-400,ar-16-9");
        assert_eq!(d.get(TransformKey::AspectRatio), Some("16-9"));
    }

    #[test]
    fn unknown_keys_and_bare_tokens_are_dropped() {
        let d = Directive::parse("zz-1,w-10,garbage,,blur-5");
        assert_eq!(d.entries(), &[(TransformKey::Width, "10".to_string())]);
    }

    #[test]
    fn only_first_tr_parameter_is_honored() {
        let d = Directive::from_url("https://x.test/a.png?foo=1&tr=w-10&tr=w-20");
        assert_eq!(d.get(TransformKey::Width), Some("10"));
    }

    #[test]
    fn tr_must_be_the_parameter_name() {
        let d = Directive::from_url("https://x.test/a.png?xtr=w-10");
        assert!(d.is_empty());
    }

    #[test]
    fn directive_after_ampersand_without_query() {
        let d = Directive::from_url("https://x.test/a.png&tr=h-50");
        assert_eq!(d.get(TransformKey::Height), Some("50"));
    }

    #[test]
    fn missing_directive_is_empty() {
        assert!(Directive::from_url("https://x.test/a.png").is_empty());
        assert!(Directive::from_url("").is_empty());
    }

    #[test]
    fn percent_encoded_directive() {
        let d = Directive::from_url("https://x.test/a.png?tr=w-300%2Ch-200");
        assert_eq!(d.get(TransformKey::Width), Some("300"));
        assert_eq!(d.get(TransformKey::Height), Some("200"));
    }

    #[test]
    fn percent_decode_edge_cases() {
        assert_eq!(percent_decode("a%2Cb"), "a,b");
        assert_eq!(percent_decode("a+b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%41"), "A");
    }

    #[test]
    fn last_value_wins() {
        let r = TransformRequest::from_url("https://x.test/a.png?tr=w-100,w-200,q-10,q-20");
        assert_eq!(r.width, Some(200));
        assert_eq!(r.quality, 20);
    }

    #[test]
    fn invalid_format_keeps_previous_value() {
        let r = TransformRequest::from_url("https://x.test/a.png?tr=f-webp,f-tiff");
        assert_eq!(r.format, RequestedFormat::WebP);
        let r = TransformRequest::from_url("https://x.test/a.png?tr=f-tiff");
        assert_eq!(r.format, RequestedFormat::Auto);
    }

    #[test]
    fn defaults_apply_without_directive() {
        let r = TransformRequest::from_url("https://x.test/a.png");
        assert_eq!(r, TransformRequest::default());
        assert_eq!(r.quality, 90);
        assert_eq!(r.background, Rgb::new(0xF3, 0xF3, 0xF3));
    }

    #[test]
    fn numeric_values_use_leading_digits() {
        let r = TransformRequest::from_url("https://x.test/a.png?tr=w-300px,h-abc,q-250");
        assert_eq!(r.width, Some(300));
        assert_eq!(r.height, None);
        assert_eq!(r.quality, 100);
    }

    #[test]
    fn zero_dimension_is_ignored() {
        let r = TransformRequest::from_url("https://x.test/a.png?tr=w-0");
        assert_eq!(r.width, None);
    }

    #[test]
    fn typed_values() {
        let r = TransformRequest::from_url(
            "https://x.test/a.png?tr=c-at_least,cm-pad_resize,fo-bottom,bg-102030,ar-4-3",
        );
        assert_eq!(r.crop, Some(CropStrategy::AtLeast));
        assert_eq!(r.crop_mode, CropMode::Pad);
        assert_eq!(r.focus, FocusSide::Bottom);
        assert_eq!(r.background, Rgb::new(0x10, 0x20, 0x30));
        assert_eq!(r.aspect_ratio, Some(AspectRatio { num: 4, den: 3 }));
    }

    #[test]
    fn unknown_crop_strategy_is_ignored() {
        let r = TransformRequest::from_url("https://x.test/a.png?tr=c-squash");
        assert_eq!(r.crop, None);
    }
}
