//! COSEM date, time and date-time values
//!
//! A [`CosemDateTime`] is a point in time plus two masks. `skip` lists the
//! fields that are "not specified" on the wire (0xFF / 0xFFFF / 0x8000) and
//! `extra` carries the month/day sentinels (DST begin/end, last day, second
//! to last day). A field bearing a sentinel and the matching mask bit are two
//! views of the same fact; decoding sets the bit and stores a placeholder in
//! the instant, encoding turns the bit back into the sentinel.
//!
//! The same type backs all three A-XDR shapes; [`DateTimeKind`] selects the
//! 12-byte date-time, 5-byte date or 4-byte time layout.

use crate::error::{DlmsError, DlmsResult};
use bitflags::bitflags;
use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeDelta, TimeZone, Timelike,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire value of an unspecified deviation.
pub const DEVIATION_NOT_SPECIFIED: i16 = i16::MIN;

bitflags! {
    /// Fields left unspecified on the wire
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DateTimeSkips: u16 {
        const YEAR = 0x1;
        const MONTH = 0x2;
        const DAY = 0x4;
        const DAY_OF_WEEK = 0x8;
        const HOUR = 0x10;
        const MINUTE = 0x20;
        const SECOND = 0x40;
        const MS = 0x80;
        const DEVIATION = 0x100;
        const STATUS = 0x200;

        const DATE = Self::YEAR.bits() | Self::MONTH.bits() | Self::DAY.bits()
            | Self::DAY_OF_WEEK.bits();
        const TIME = Self::HOUR.bits() | Self::MINUTE.bits() | Self::SECOND.bits()
            | Self::MS.bits();
    }
}

bitflags! {
    /// Month and day sentinels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DateTimeExtraInfo: u8 {
        /// Month 0xFE
        const DST_BEGIN = 0x1;
        /// Month 0xFD
        const DST_END = 0x2;
        /// Day 0xFE
        const LAST_DAY = 0x4;
        /// Day 0xFD
        const LAST_DAY2 = 0x8;
    }
}

bitflags! {
    /// Clock status byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ClockStatus: u8 {
        const INVALID_VALUE = 0x01;
        const DOUBTFUL_VALUE = 0x02;
        const DIFFERENT_CLOCK_BASE = 0x04;
        const INVALID_CLOCK_STATUS = 0x08;
        const DAYLIGHT_SAVE_ACTIVE = 0x80;
    }
}

/// Wire layout of a date/time value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateTimeKind {
    DateTime,
    Date,
    Time,
}

impl DateTimeKind {
    /// Encoded body length.
    pub fn len(self) -> usize {
        match self {
            DateTimeKind::DateTime => 12,
            DateTimeKind::Date => 5,
            DateTimeKind::Time => 4,
        }
    }
}

/// Options shared by the A-XDR encoder and decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodecOptions {
    /// The meter stores the deviation with the opposite sign.
    pub use_utc_to_normal_time: bool,
}

/// A COSEM date, time or date-time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosemDateTime {
    value: DateTime<FixedOffset>,
    skip: DateTimeSkips,
    extra: DateTimeExtraInfo,
    status: ClockStatus,
    day_of_week: Option<u8>,
}

impl CosemDateTime {
    /// Wrap a fully specified instant.
    pub fn new(value: DateTime<FixedOffset>) -> Self {
        Self {
            value,
            skip: DateTimeSkips::empty(),
            extra: DateTimeExtraInfo::empty(),
            status: ClockStatus::empty(),
            day_of_week: None,
        }
    }

    /// Interpret `naive` in the local time zone.
    pub fn from_naive_local(naive: NaiveDateTime) -> Self {
        Self::new(local_instant(naive))
    }

    /// Interpret `naive` with a fixed offset, in minutes east of UTC.
    pub fn from_naive_with_offset(naive: NaiveDateTime, offset_minutes: i32) -> DlmsResult<Self> {
        let offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            DlmsError::InvalidData(format!("offset {} minutes out of range", offset_minutes))
        })?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(Self::new)
            .ok_or_else(|| DlmsError::InvalidData(format!("invalid local time {}", naive)))
    }

    pub fn value(&self) -> DateTime<FixedOffset> {
        self.value
    }

    /// Wall-clock fields as stored, ignoring the offset.
    pub fn naive_local(&self) -> NaiveDateTime {
        self.value.naive_local()
    }

    pub fn skip(&self) -> DateTimeSkips {
        self.skip
    }

    pub fn set_skip(&mut self, skip: DateTimeSkips) {
        self.skip = skip;
    }

    pub fn with_skip(mut self, skip: DateTimeSkips) -> Self {
        self.skip |= skip;
        self
    }

    pub fn extra(&self) -> DateTimeExtraInfo {
        self.extra
    }

    pub fn set_extra(&mut self, extra: DateTimeExtraInfo) {
        self.extra = extra;
    }

    pub fn status(&self) -> ClockStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ClockStatus) {
        self.status = status;
    }

    /// Day of week, 1 = Monday .. 7 = Sunday. Computed from the date unless
    /// explicitly set.
    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
            .unwrap_or_else(|| self.value.weekday().number_from_monday() as u8)
    }

    pub fn set_day_of_week(&mut self, day_of_week: Option<u8>) {
        self.day_of_week = day_of_week;
    }

    /// Deviation in minutes as stored on the wire (`UTC = local + deviation`),
    /// or `None` when skipped.
    pub fn deviation(&self) -> Option<i16> {
        if self.skip.contains(DateTimeSkips::DEVIATION) {
            None
        } else {
            Some((-self.value.offset().local_minus_utc() / 60) as i16)
        }
    }

    // ---------------------------------------------------------------
    // Wire format
    // ---------------------------------------------------------------

    /// Encode the body (without tag) in the layout given by `kind`.
    pub fn to_bytes(&self, kind: DateTimeKind, options: &CodecOptions) -> Vec<u8> {
        let mut out = Vec::with_capacity(kind.len());
        if kind != DateTimeKind::Time {
            self.push_date(&mut out);
        }
        if kind != DateTimeKind::Date {
            self.push_time(&mut out);
        }
        if kind == DateTimeKind::DateTime {
            let deviation = if self.skip.contains(DateTimeSkips::DEVIATION) {
                DEVIATION_NOT_SPECIFIED
            } else {
                let east = (self.value.offset().local_minus_utc() / 60) as i16;
                if options.use_utc_to_normal_time { east } else { -east }
            };
            out.extend_from_slice(&deviation.to_be_bytes());
            out.push(if self.skip.contains(DateTimeSkips::STATUS) {
                0xFF
            } else {
                self.status.bits()
            });
        }
        out
    }

    fn push_date(&self, out: &mut Vec<u8>) {
        let year = if self.skip.contains(DateTimeSkips::YEAR) {
            0xFFFF
        } else {
            self.value.year() as u16
        };
        out.extend_from_slice(&year.to_be_bytes());
        out.push(if self.extra.contains(DateTimeExtraInfo::DST_BEGIN) {
            0xFE
        } else if self.extra.contains(DateTimeExtraInfo::DST_END) {
            0xFD
        } else if self.skip.contains(DateTimeSkips::MONTH) {
            0xFF
        } else {
            self.value.month() as u8
        });
        out.push(if self.extra.contains(DateTimeExtraInfo::LAST_DAY) {
            0xFE
        } else if self.extra.contains(DateTimeExtraInfo::LAST_DAY2) {
            0xFD
        } else if self.skip.contains(DateTimeSkips::DAY) {
            0xFF
        } else {
            self.value.day() as u8
        });
        out.push(if self.skip.contains(DateTimeSkips::DAY_OF_WEEK) {
            0xFF
        } else {
            self.day_of_week()
        });
    }

    fn push_time(&self, out: &mut Vec<u8>) {
        let field = |flag: DateTimeSkips, v: u32| {
            if self.skip.contains(flag) { 0xFF } else { v as u8 }
        };
        out.push(field(DateTimeSkips::HOUR, self.value.hour()));
        out.push(field(DateTimeSkips::MINUTE, self.value.minute()));
        out.push(field(DateTimeSkips::SECOND, self.value.second()));
        out.push(field(
            DateTimeSkips::MS,
            self.value.nanosecond() % 1_000_000_000 / 10_000_000,
        ));
    }

    /// Decode a body of the given `kind`. `bytes` must hold at least
    /// `kind.len()` bytes; surplus bytes are ignored.
    pub fn from_bytes(kind: DateTimeKind, bytes: &[u8], options: &CodecOptions) -> DlmsResult<Self> {
        if bytes.len() < kind.len() {
            return Err(DlmsError::IncompletePdu(format!(
                "{:?} needs {} bytes, got {}",
                kind,
                kind.len(),
                bytes.len()
            )));
        }
        let mut skip = DateTimeSkips::empty();
        let mut extra = DateTimeExtraInfo::empty();
        let mut day_of_week = None;
        let mut status = ClockStatus::empty();

        let (year, month, day) = if kind == DateTimeKind::Time {
            skip |= DateTimeSkips::DATE;
            (2000, 1, 1)
        } else {
            let mut year = u16::from_be_bytes([bytes[0], bytes[1]]) as i32;
            if year == 0xFFFF {
                skip |= DateTimeSkips::YEAR;
                year = 2000;
            }
            let month = match bytes[2] {
                0xFE => {
                    extra |= DateTimeExtraInfo::DST_BEGIN;
                    1
                }
                0xFD => {
                    extra |= DateTimeExtraInfo::DST_END;
                    1
                }
                0 | 0xFF => {
                    skip |= DateTimeSkips::MONTH;
                    1
                }
                m => m as u32,
            };
            let day = match bytes[3] {
                0xFE => {
                    extra |= DateTimeExtraInfo::LAST_DAY;
                    1
                }
                0xFD => {
                    extra |= DateTimeExtraInfo::LAST_DAY2;
                    1
                }
                0 | 0xFF => {
                    skip |= DateTimeSkips::DAY;
                    1
                }
                d => d as u32,
            };
            match bytes[4] {
                0xFF => skip |= DateTimeSkips::DAY_OF_WEEK,
                dow => day_of_week = Some(dow),
            }
            (year, month, day)
        };

        let (hour, minute, second, ms) = if kind == DateTimeKind::Date {
            skip |= DateTimeSkips::TIME;
            (0, 0, 0, 0)
        } else {
            let t = if kind == DateTimeKind::Time { 0 } else { 5 };
            let mut field = |v: u8, flag: DateTimeSkips| {
                if v == 0xFF {
                    skip |= flag;
                    0
                } else {
                    v as u32
                }
            };
            let hour = field(bytes[t], DateTimeSkips::HOUR);
            let minute = field(bytes[t + 1], DateTimeSkips::MINUTE);
            let second = field(bytes[t + 2], DateTimeSkips::SECOND);
            let ms = field(bytes[t + 3], DateTimeSkips::MS) * 10;
            (hour, minute, second, ms)
        };

        let mut deviation = DEVIATION_NOT_SPECIFIED;
        if kind == DateTimeKind::DateTime {
            deviation = i16::from_be_bytes([bytes[9], bytes[10]]);
            match bytes[11] {
                0xFF => skip |= DateTimeSkips::STATUS,
                s => status = ClockStatus::from_bits_retain(s),
            }
        } else {
            skip |= DateTimeSkips::STATUS;
        }

        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            DlmsError::malformed(0, format!("invalid date {}-{}-{}", year, month, day))
        })?;
        let time = NaiveTime::from_hms_milli_opt(hour, minute, second, ms).ok_or_else(|| {
            DlmsError::malformed(0, format!("invalid time {}:{}:{}.{}", hour, minute, second, ms))
        })?;
        let naive = NaiveDateTime::new(date, time);

        let value = if deviation == DEVIATION_NOT_SPECIFIED || deviation == -1 {
            skip |= DateTimeSkips::DEVIATION;
            local_instant(naive)
        } else {
            let east = if options.use_utc_to_normal_time {
                deviation as i32
            } else {
                -(deviation as i32)
            };
            let offset = FixedOffset::east_opt(east * 60).ok_or_else(|| {
                DlmsError::malformed(9, format!("deviation {} out of range", deviation))
            })?;
            offset
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| DlmsError::malformed(0, format!("invalid local time {}", naive)))?
        };
        log::trace!("decoded {:?} {} skip={:?} extra={:?}", kind, value, skip, extra);
        Ok(Self {
            value,
            skip,
            extra,
            status,
            day_of_week,
        })
    }

    // ---------------------------------------------------------------
    // Text format
    // ---------------------------------------------------------------

    /// Parse text laid out as `pattern`. See [`format_with_pattern`](Self::format_with_pattern)
    /// for the pattern syntax. A run of `*` in place of a field marks it skipped.
    /// Fields absent from the pattern are skipped as well. The instant is
    /// taken in the local time zone.
    pub fn parse_with_pattern(text: &str, pattern: &str) -> DlmsResult<Self> {
        let tokens = tokenize(pattern);
        let chars: Vec<char> = text.trim().chars().collect();
        let mut pos = 0usize;
        let mut skip = DateTimeSkips::all() & !DateTimeSkips::DEVIATION & !DateTimeSkips::STATUS;
        let (mut year, mut month, mut day) = (2000i32, 1u32, 1u32);
        let (mut hour, mut minute, mut second, mut ms) = (0u32, 0u32, 0u32, 0u32);

        for token in &tokens {
            match token {
                Token::Literal(c) => {
                    if chars.get(pos) != Some(c) {
                        return Err(DlmsError::malformed(
                            pos,
                            format!("expected '{}' in \"{}\"", c, text),
                        ));
                    }
                    pos += 1;
                }
                Token::Field(field, width) => {
                    let flag = field.skip_flag();
                    if chars.get(pos) == Some(&'*') {
                        while chars.get(pos) == Some(&'*') {
                            pos += 1;
                        }
                        skip |= flag;
                        continue;
                    }
                    let max = field.max_digits(*width);
                    let start = pos;
                    while pos < chars.len() && pos - start < max && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                    if start == pos {
                        return Err(DlmsError::malformed(
                            start,
                            format!("expected digits in \"{}\"", text),
                        ));
                    }
                    let digits: String = chars[start..pos].iter().collect();
                    let v: u32 = digits
                        .parse()
                        .map_err(|_| DlmsError::malformed(start, "invalid number"))?;
                    skip &= !flag;
                    match field {
                        Field::Year if *width <= 2 => year = 2000 + v as i32,
                        Field::Year => year = v as i32,
                        Field::Month => month = v,
                        Field::Day => day = v,
                        Field::Hour => hour = v,
                        Field::Minute => minute = v,
                        Field::Second => second = v,
                        Field::Millis => ms = v,
                    }
                }
            }
        }
        if pos != chars.len() {
            return Err(DlmsError::malformed(
                pos,
                format!("trailing characters in \"{}\"", text),
            ));
        }
        // Day of week follows the date; unknown if any date part is missing.
        if skip.intersects(DateTimeSkips::YEAR | DateTimeSkips::MONTH | DateTimeSkips::DAY) {
            skip |= DateTimeSkips::DAY_OF_WEEK;
        } else {
            skip &= !DateTimeSkips::DAY_OF_WEEK;
        }
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            DlmsError::malformed(0, format!("invalid date {}-{}-{}", year, month, day))
        })?;
        let time = NaiveTime::from_hms_milli_opt(hour, minute, second, ms).ok_or_else(|| {
            DlmsError::malformed(0, format!("invalid time {}:{}:{}", hour, minute, second))
        })?;
        let mut result = Self::from_naive_local(NaiveDateTime::new(date, time));
        result.skip = skip;
        Ok(result)
    }

    /// Format with a pattern made of `yyyy`, `yy`, `MM`, `M`, `dd`, `d`,
    /// `HH`, `H`, `mm`, `ss` and `fff` tokens; anything else is literal.
    /// Skipped fields print as `*`.
    pub fn format_with_pattern(&self, pattern: &str) -> String {
        let mut out = String::new();
        for token in tokenize(pattern) {
            match token {
                Token::Literal(c) => out.push(c),
                Token::Field(field, width) => {
                    if self.skip.contains(field.skip_flag()) {
                        out.push('*');
                        continue;
                    }
                    let v = match field {
                        Field::Year if width <= 2 => self.value.year().rem_euclid(100) as u32,
                        Field::Year => self.value.year() as u32,
                        Field::Month => self.value.month(),
                        Field::Day => self.value.day(),
                        Field::Hour => self.value.hour(),
                        Field::Minute => self.value.minute(),
                        Field::Second => self.value.second(),
                        Field::Millis => self.value.nanosecond() % 1_000_000_000 / 1_000_000,
                    };
                    out.push_str(&format!("{:0width$}", v, width = width));
                }
            }
        }
        out
    }

    /// Parse using the date-time pattern of `locale`.
    pub fn parse(text: &str, locale: &str) -> DlmsResult<Self> {
        Self::parse_with_pattern(text, locale_pattern(locale)?.date_time)
    }

    /// Parse a date-only string using the date pattern of `locale`.
    pub fn parse_date(text: &str, locale: &str) -> DlmsResult<Self> {
        Self::parse_with_pattern(text, locale_pattern(locale)?.date)
    }

    /// Parse a time-only string using the time pattern of `locale`.
    pub fn parse_time(text: &str, locale: &str) -> DlmsResult<Self> {
        Self::parse_with_pattern(text, locale_pattern(locale)?.time)
    }

    /// Format for `locale` in the layout of `kind`.
    pub fn format(&self, kind: DateTimeKind, locale: &str) -> DlmsResult<String> {
        let patterns = locale_pattern(locale)?;
        Ok(self.format_with_pattern(match kind {
            DateTimeKind::DateTime => patterns.date_time,
            DateTimeKind::Date => patterns.date,
            DateTimeKind::Time => patterns.time,
        }))
    }
}

impl fmt::Display for CosemDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with_pattern(INVARIANT.date_time))
    }
}

fn local_instant(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.fixed_offset(),
        // Inside a DST gap the wall time does not exist locally.
        None => {
            let offset = Local.offset_from_utc_datetime(&naive).fix();
            DateTime::from_naive_utc_and_offset(
                naive - TimeDelta::seconds(offset.local_minus_utc() as i64),
                offset,
            )
        }
    }
}

/// Date, time and date-time patterns of one locale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalePattern {
    pub date_time: &'static str,
    pub date: &'static str,
    pub time: &'static str,
}

const INVARIANT: LocalePattern = LocalePattern {
    date_time: "yyyy-MM-dd HH:mm:ss",
    date: "yyyy-MM-dd",
    time: "HH:mm:ss",
};

static LOCALE_PATTERNS: &[(&str, LocalePattern)] = &[
    ("", INVARIANT),
    ("iso", INVARIANT),
    (
        "en-US",
        LocalePattern {
            date_time: "MM/dd/yyyy HH:mm:ss",
            date: "MM/dd/yyyy",
            time: "HH:mm:ss",
        },
    ),
    (
        "en-GB",
        LocalePattern {
            date_time: "dd/MM/yyyy HH:mm:ss",
            date: "dd/MM/yyyy",
            time: "HH:mm:ss",
        },
    ),
    (
        "fi-FI",
        LocalePattern {
            date_time: "dd.MM.yyyy HH.mm.ss",
            date: "dd.MM.yyyy",
            time: "HH.mm.ss",
        },
    ),
    (
        "de-DE",
        LocalePattern {
            date_time: "dd.MM.yyyy HH:mm:ss",
            date: "dd.MM.yyyy",
            time: "HH:mm:ss",
        },
    ),
    ("sv-SE", INVARIANT),
];

/// Look up the patterns for a locale name such as `"fi-FI"` or `"fi"`.
pub fn locale_pattern(locale: &str) -> DlmsResult<LocalePattern> {
    let exact = LOCALE_PATTERNS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(locale));
    let language = || {
        LOCALE_PATTERNS.iter().find(|(name, _)| {
            name.split('-')
                .next()
                .is_some_and(|lang| !lang.is_empty() && lang.eq_ignore_ascii_case(locale))
        })
    };
    exact
        .or_else(language)
        .map(|(_, p)| *p)
        .ok_or_else(|| DlmsError::UnknownEnum(format!("locale '{}'", locale)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millis,
}

impl Field {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'y' => Field::Year,
            'M' => Field::Month,
            'd' => Field::Day,
            'H' => Field::Hour,
            'm' => Field::Minute,
            's' => Field::Second,
            'f' => Field::Millis,
            _ => return None,
        })
    }

    fn skip_flag(self) -> DateTimeSkips {
        match self {
            Field::Year => DateTimeSkips::YEAR,
            Field::Month => DateTimeSkips::MONTH,
            Field::Day => DateTimeSkips::DAY,
            Field::Hour => DateTimeSkips::HOUR,
            Field::Minute => DateTimeSkips::MINUTE,
            Field::Second => DateTimeSkips::SECOND,
            Field::Millis => DateTimeSkips::MS,
        }
    }

    fn max_digits(self, width: usize) -> usize {
        match self {
            Field::Year if width <= 2 => 2,
            Field::Year => 4,
            Field::Millis => 3,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    Field(Field, usize),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    for c in pattern.chars() {
        match (Field::from_char(c), tokens.last_mut()) {
            (Some(field), Some(Token::Field(last, width))) if *last == field => *width += 1,
            (Some(field), _) => tokens.push(Token::Field(field, 1)),
            (None, _) => tokens.push(Token::Literal(c)),
        }
    }
    tokens
}
