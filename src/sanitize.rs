//! Markup stripping for report field values.
//!
//! Browsers copy attacker-influenced URLs and policy text into reports, so every value is
//! treated as hostile markup before it reaches the CSV log.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use html5ever::LocalName;

/// Keeps character tokens; drops tags, comments, doctypes and everything inside
/// `<script>`/`<style>`.
struct TextSink {
    out: String,
    skipping: Option<LocalName>,
}

impl TokenSink for TextSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag if self.skipping.is_none() => {
                    // Raw modes keep the tokenizer from reading markup inside script/style.
                    let raw = match &*tag.name {
                        "script" => Some(RawKind::ScriptData),
                        "style" => Some(RawKind::Rawtext),
                        _ => None,
                    };
                    if let Some(kind) = raw {
                        self.skipping = Some(tag.name);
                        return TokenSinkResult::RawData(kind);
                    }
                }
                TagKind::EndTag if self.skipping.as_ref() == Some(&tag.name) => {
                    self.skipping = None;
                }
                _ => {}
            },
            Token::CharacterTokens(text) if self.skipping.is_none() => self.out.push_str(&text),
            Token::NullCharacterToken if self.skipping.is_none() => self.out.push('\0'),
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

/// Remove markup tags from `input`.
///
/// `<script>` and `<style>` elements lose their content too, up to the end of input if never
/// closed. Every other tag is removed and its surrounding text kept. Character references are
/// not decoded: `&amp;` stays `&amp;`.
pub fn strip_tags(input: &str) -> String {
    if !input.contains('<') {
        return input.to_string();
    }

    // Escaping every `&` makes the tokenizer hand back references exactly as written.
    let escaped = input.replace('&', "&amp;");

    let mut queue = BufferQueue::default();
    queue.push_back(StrTendril::from_slice(&escaped));

    let sink = TextSink {
        out: String::with_capacity(input.len()),
        skipping: None,
    };
    let mut tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
    let _ = tokenizer.feed(&mut queue);
    tokenizer.end();
    tokenizer.sink.out
}

/// Trim the same set of characters PHP-era collectors trimmed: space, tab, LF, CR, NUL and
/// vertical tab. Other Unicode whitespace is kept as data.
pub fn trim_value(s: &str) -> &str {
    s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B'))
}

pub fn sanitize(s: &str) -> String {
    trim_value(&strip_tags(s)).to_string()
}
