//! Translator sink interface
//!
//! Decoders can mirror what they parse into a tree of tags when a sink is
//! attached. Sink calls never change decoder state or byte consumption.

use crate::pdu_type::PduType;
use dlms_core::datatypes::DataType;
use std::fmt::Write;

/// Receiver of a parallel tag tree built while decoding
#[cfg_attr(test, mockall::automock)]
pub trait TranslatorSink {
    /// Tag name for an A-XDR data type
    fn data_type_tag(&self, data_type: DataType) -> String;

    /// Tag name for a general (PDU level) identifier
    fn general_tag(&self, id: u8) -> String;

    fn open(&mut self, tag: &str, attributes: &[(String, String)]);

    fn close(&mut self, tag: &str);

    fn leaf(&mut self, tag: &str, value: &str);

    fn comment(&mut self, text: &str);

    /// Render an integer, as hex with `digits` digits when `force_hex` is set
    fn integer_to_hex(&self, value: u64, digits: usize, force_hex: bool) -> String;
}

/// Minimal sink producing simple XML text
#[derive(Debug, Default, Clone)]
pub struct XmlTranslator {
    out: String,
    depth: usize,
    show_comments: bool,
}

impl XmlTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comments(mut self, show: bool) -> Self {
        self.show_comments = show;
        self
    }

    /// Text written so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn clear(&mut self) {
        self.out.clear();
        self.depth = 0;
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }
}

impl TranslatorSink for XmlTranslator {
    fn data_type_tag(&self, data_type: DataType) -> String {
        data_type.name().to_string()
    }

    fn general_tag(&self, id: u8) -> String {
        PduType::from_u8(id)
            .map(|p| p.name().to_string())
            .unwrap_or_else(|_| format!("Unknown{:02X}", id))
    }

    fn open(&mut self, tag: &str, attributes: &[(String, String)]) {
        self.indent();
        let _ = write!(self.out, "<{}", tag);
        for (k, v) in attributes {
            let _ = write!(self.out, " {}=\"{}\"", k, v);
        }
        self.out.push_str(">\n");
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        let _ = writeln!(self.out, "</{}>", tag);
    }

    fn leaf(&mut self, tag: &str, value: &str) {
        self.indent();
        let _ = writeln!(self.out, "<{} Value=\"{}\" />", tag, value);
    }

    fn comment(&mut self, text: &str) {
        if self.show_comments {
            self.indent();
            let _ = writeln!(self.out, "<!--{}-->", text);
        }
    }

    fn integer_to_hex(&self, value: u64, digits: usize, force_hex: bool) -> String {
        if force_hex {
            format!("{:0width$X}", value, width = digits)
        } else {
            value.to_string()
        }
    }
}
