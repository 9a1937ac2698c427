use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CMD_NORMALIZER: CmdNormalizer = CmdNormalizer::new();
}

/// Normalizes raw command text before tokenizing: control whitespace becomes a
/// single space and single or curly quotes become plain double quotes.
pub struct CmdNormalizer {
    re_control_whitespace: Regex,
    re_quotes: Regex,
}

impl Default for CmdNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CmdNormalizer {
    pub fn new() -> Self {
        Self {
            re_control_whitespace: Regex::new(r"[\n\t\r]+").expect("static regex"),
            re_quotes: Regex::new(r#"['\u{201C}\u{201D}]"#).expect("static regex"),
        }
    }

    pub fn process(&self, input: &str) -> String {
        let output = self.re_control_whitespace.replace_all(input, " ");
        let output = self.re_quotes.replace_all(&output, "\"");
        output.trim().to_string()
    }
}

pub fn normalize_cmd(cmd: &str) -> String {
    CMD_NORMALIZER.process(cmd)
}
