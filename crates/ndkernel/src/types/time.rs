// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time-of-day type.
//!
//! An element is an `i64` count of 100 ns ticks since midnight, tagged at
//! the type level with a timezone. Only the abstract (zone-less) and UTC
//! zones are supported; any other zone name is rejected when the type is
//! built.
//!
//! Text form: `HH:MM`, `HH:MM:SS` or `HH:MM:SS.f` with 1 to 7 fraction
//! digits, optionally followed by `Z`, `UTC` or ` UTC` for UTC times.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use super::{Type, TypeHeader, TypeId, TypeKind, TypeOps, TypeVariant};
use crate::config::{
    AssignErrorMode, EvalContext, TICKS_PER_DAY, TICKS_PER_HOUR, TICKS_PER_MICROSECOND,
    TICKS_PER_MINUTE, TICKS_PER_SECOND, TIME_FRACTION_DIGITS,
};
use crate::error::{Error, Result};
use crate::kernels::{AssignRequest, CompareRequest, KernelBuilder, KernelRequest, KernelUnit, Side};
use crate::memblock::BlockRef;
use crate::properties::{Callable, PropertyInfo, TypePropertyValue};
use crate::types::{BuiltinTypeId, StringLayout};

// ============================================================================
// Timezone
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeZone {
    /// No zone; the value is a wall-clock time.
    Abstract,
    Utc,
}

impl TimeZone {
    /// Resolve a zone name; only `abstract` and `UTC` are supported.
    pub fn from_name(name: &str) -> Result<TimeZone> {
        match name {
            "" | "abstract" => Ok(TimeZone::Abstract),
            "UTC" | "utc" | "Z" => Ok(TimeZone::Utc),
            other => Err(Error::InvalidArgument(format!(
                "time zone support is partial, cannot handle '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeZone::Abstract => f.write_str("abstract"),
            TimeZone::Utc => f.write_str("UTC"),
        }
    }
}

/// Time type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeType {
    pub tz: TimeZone,
}

impl Type {
    /// Abstract (zone-less) time.
    pub fn time() -> Type {
        Type::time_with_zone(TimeZone::Abstract)
    }

    pub fn time_with_zone(tz: TimeZone) -> Type {
        Type::from_variant(TypeVariant::Time(TimeType { tz }))
    }

    /// Time with a zone given by name; unsupported zones fail here.
    pub fn time_with_zone_name(name: &str) -> Result<Type> {
        Ok(Type::time_with_zone(TimeZone::from_name(name)?))
    }
}

// ============================================================================
// Hour/minute/second/tick record
// ============================================================================

/// Broken-down time of day, laid out as
/// `{hour: int8, minute: int8, second: int8, tick: int32}`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeHmst {
    pub hour: i8,
    pub minute: i8,
    pub second: i8,
    /// Sub-second ticks, `0..10_000_000`.
    pub tick: i32,
}

impl TimeHmst {
    pub fn new(hour: i8, minute: i8, second: i8, tick: i32) -> Self {
        Self {
            hour,
            minute,
            second,
            tick,
        }
    }

    /// Break a tick count down; counts outside one day wrap.
    pub fn from_ticks(ticks: i64) -> Self {
        let t = ticks.rem_euclid(TICKS_PER_DAY);
        Self {
            hour: (t / TICKS_PER_HOUR) as i8,
            minute: ((t / TICKS_PER_MINUTE) % 60) as i8,
            second: ((t / TICKS_PER_SECOND) % 60) as i8,
            tick: (t % TICKS_PER_SECOND) as i32,
        }
    }

    pub fn to_ticks(&self) -> i64 {
        i64::from(self.hour) * TICKS_PER_HOUR
            + i64::from(self.minute) * TICKS_PER_MINUTE
            + i64::from(self.second) * TICKS_PER_SECOND
            + i64::from(self.tick)
    }

    pub fn is_valid(&self) -> bool {
        (0..24).contains(&self.hour)
            && (0..60).contains(&self.minute)
            && (0..60).contains(&self.second)
            && (0..TICKS_PER_SECOND).contains(&i64::from(self.tick))
    }

    /// Parse the time part of `s`, returning it and the unparsed suffix.
    pub fn parse(s: &str) -> Result<(TimeHmst, &str)> {
        Self::parse_in(s, TimeZone::Abstract)
    }

    /// Like [`TimeHmst::parse`], with errors naming the time type of `tz`.
    pub fn parse_in(s: &str, tz: TimeZone) -> Result<(TimeHmst, &str)> {
        let target = TimeType { tz };
        let bad = |reason: &str| Error::invalid_value(format!("\"{}\"", s), &target, reason.to_string());
        let bytes = s.as_bytes();
        let mut pos = 0;

        let digits = |pos: &mut usize, min: usize, max: usize| -> Option<(i64, usize)> {
            let start = *pos;
            let mut v = 0i64;
            while *pos < bytes.len() && *pos - start < max && bytes[*pos].is_ascii_digit() {
                v = v * 10 + i64::from(bytes[*pos] - b'0');
                *pos += 1;
            }
            let n = *pos - start;
            (n >= min).then_some((v, n))
        };

        let (hour, _) = digits(&mut pos, 1, 2).ok_or_else(|| bad("expected hours"))?;
        if bytes.get(pos) != Some(&b':') {
            return Err(bad("expected ':' after hours"));
        }
        pos += 1;
        let (minute, _) = digits(&mut pos, 2, 2).ok_or_else(|| bad("expected two-digit minutes"))?;
        let mut second = 0;
        let mut tick = 0;
        if bytes.get(pos) == Some(&b':') {
            pos += 1;
            second = digits(&mut pos, 2, 2).ok_or_else(|| bad("expected two-digit seconds"))?.0;
            if bytes.get(pos) == Some(&b'.') {
                pos += 1;
                let (frac, n) = digits(&mut pos, 1, TIME_FRACTION_DIGITS)
                    .ok_or_else(|| bad("expected fraction digits"))?;
                if bytes.get(pos).is_some_and(u8::is_ascii_digit) {
                    return Err(bad("more than 7 fraction digits"));
                }
                tick = frac * 10i64.pow((TIME_FRACTION_DIGITS - n) as u32);
            }
        }
        if hour >= 24 || minute >= 60 || second >= 60 {
            return Err(bad("field out of range"));
        }
        let hmst = TimeHmst::new(hour as i8, minute as i8, second as i8, tick as i32);
        Ok((hmst, &s[pos..]))
    }
}

impl fmt::Display for TimeHmst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)?;
        if self.second == 0 && self.tick == 0 {
            return Ok(());
        }
        write!(f, ":{:02}", self.second)?;
        if self.tick == 0 {
            Ok(())
        } else if self.tick % 10_000 == 0 {
            write!(f, ".{:03}", self.tick / 10_000)
        } else if self.tick % 10 == 0 {
            write!(f, ".{:06}", self.tick / 10)
        } else {
            write!(f, ".{:07}", self.tick)
        }
    }
}

/// Struct type matching [`TimeHmst`].
pub fn time_hmst_type() -> Type {
    static TP: OnceLock<Type> = OnceLock::new();
    TP.get_or_init(|| {
        Type::cstruct_unchecked(vec![
            ("hour".to_string(), Type::builtin(BuiltinTypeId::Int8)),
            ("minute".to_string(), Type::builtin(BuiltinTypeId::Int8)),
            ("second".to_string(), Type::builtin(BuiltinTypeId::Int8)),
            ("tick".to_string(), Type::builtin(BuiltinTypeId::Int32)),
        ])
    })
    .clone()
}

// ============================================================================
// Element operations used by kernel units
// ============================================================================

/// Parse `text` into ticks, validating any zone suffix against `tz`.
pub(crate) fn parse_ticks(text: &str, tz: TimeZone, errmode: AssignErrorMode) -> Result<i64> {
    let text = text.trim();
    let (hmst, rest) = TimeHmst::parse_in(text, tz)?;
    let suffix = rest.trim_start();
    if !suffix.is_empty() {
        match tz {
            TimeZone::Utc if suffix == "Z" || suffix == "UTC" => {}
            TimeZone::Utc => {
                return Err(Error::invalid_value(
                    format!("\"{}\"", text),
                    &TimeType { tz },
                    format!("time zone support is partial, cannot handle '{}'", suffix),
                ))
            }
            TimeZone::Abstract if errmode == AssignErrorMode::NoCheck => {}
            TimeZone::Abstract => {
                return Err(Error::invalid_value(
                    format!("\"{}\"", text),
                    &TimeType { tz },
                    format!("abstract time cannot carry time zone '{}'", suffix),
                ))
            }
        }
    }
    Ok(hmst.to_ticks())
}

/// Read one property of the time at `src` into `dst`.
///
/// # Safety
///
/// `src` must point to a time element, `dst` to a writable `int32` (or a
/// [`TimeHmst`] record for [`TimeField::Struct`]).
pub(crate) unsafe fn get_field(field: TimeField, dst: *mut u8, src: *const u8) {
    let ticks = src.cast::<i64>().read_unaligned();
    let v = match field {
        TimeField::Hour => ticks / TICKS_PER_HOUR,
        TimeField::Minute => (ticks / TICKS_PER_MINUTE) % 60,
        TimeField::Second => (ticks / TICKS_PER_SECOND) % 60,
        TimeField::Microsecond => (ticks / TICKS_PER_MICROSECOND) % 1_000_000,
        TimeField::Tick => ticks % TICKS_PER_SECOND,
        TimeField::Struct => {
            dst.cast::<TimeHmst>().write_unaligned(TimeHmst::from_ticks(ticks));
            return;
        }
    };
    dst.cast::<i32>().write_unaligned(v as i32);
}

/// Write the time at `dst` from the record at `src`.
///
/// # Safety
///
/// `src` must point to a [`TimeHmst`] record, `dst` to a writable time.
pub(crate) unsafe fn set_from_struct(
    dst: *mut u8,
    src: *const u8,
    tz: TimeZone,
    errmode: AssignErrorMode,
) -> Result<()> {
    let hmst = src.cast::<TimeHmst>().read_unaligned();
    if errmode != AssignErrorMode::NoCheck && !hmst.is_valid() {
        return Err(Error::invalid_value(
            format!("{}:{}:{}, ticks: {}", hmst.hour, hmst.minute, hmst.second, hmst.tick),
            &TimeType { tz },
            "invalid input time",
        ));
    }
    dst.cast::<i64>().write_unaligned(hmst.to_ticks());
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

/// Elementwise properties of a time, in property-index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeField {
    Hour,
    Minute,
    Second,
    Microsecond,
    Tick,
    /// Read/write access as a [`TimeHmst`] record.
    Struct,
}

impl TimeField {
    pub const ALL: [TimeField; 6] = [
        TimeField::Hour,
        TimeField::Minute,
        TimeField::Second,
        TimeField::Microsecond,
        TimeField::Tick,
        TimeField::Struct,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TimeField::Hour => "hour",
            TimeField::Minute => "minute",
            TimeField::Second => "second",
            TimeField::Microsecond => "microsecond",
            TimeField::Tick => "tick",
            TimeField::Struct => "struct",
        }
    }

    fn from_index(this: &Type, index: usize) -> Result<TimeField> {
        TimeField::ALL.get(index).copied().ok_or_else(|| Error::UnknownProperty {
            type_repr: this.to_string(),
            name: format!("#{}", index),
        })
    }
}

// ============================================================================
// TypeOps
// ============================================================================

impl TypeOps for TimeType {
    fn header(&self) -> TypeHeader {
        TypeHeader::scalar(TypeId::Time, TypeKind::Datetime, 8, std::mem::align_of::<i64>())
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        match self.tz {
            TimeZone::Abstract => f.write_str("time"),
            TimeZone::Utc => f.write_str("time[tz='UTC']"),
        }
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        _arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        let ticks = data.cast::<i64>().read_unaligned();
        write!(out, "{}", TimeHmst::from_ticks(ticks))?;
        if self.tz == TimeZone::Utc {
            out.write_char('Z')?;
        }
        Ok(())
    }

    fn arrmeta_default_construct(
        &self,
        _arrmeta: &mut [u8],
        _shape: &[isize],
        _blockref_alloc: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn arrmeta_copy_construct(
        &self,
        _dst: &mut [u8],
        _src: &[u8],
        _embedded: Option<BlockRef>,
    ) -> Result<()> {
        Ok(())
    }

    fn arrmeta_reset_buffers(&self, _arrmeta: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn arrmeta_finalize_buffers(&self, _arrmeta: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn arrmeta_destruct(&self, _arrmeta: &mut [u8]) {}

    fn arrmeta_debug_print(
        &self,
        _arrmeta: &[u8],
        _out: &mut dyn fmt::Write,
        _indent: &str,
    ) -> fmt::Result {
        Ok(())
    }

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        if side == Side::Rhs {
            return Err(req.unsupported());
        }
        if let TypeVariant::Time(src) = req.src_tp.variant() {
            if src.tz != self.tz {
                return Err(req.unsupported());
            }
            return ckb.push(offset, req.request, KernelUnit::Copy { size: 8 });
        }
        if let Some(src) = StringLayout::of(req.src_tp) {
            return ckb.push(
                offset,
                req.request,
                KernelUnit::StringToTime {
                    tz: self.tz,
                    src,
                    errmode: req.errmode,
                },
            );
        }
        req.src_tp.make_assignment_kernel(ckb, offset, req, Side::Rhs)
    }

    fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &CompareRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        if side == Side::Rhs {
            return Err(req.not_comparable());
        }
        match req.src1_tp.variant() {
            TypeVariant::Time(rhs) if rhs.tz == self.tz => ckb.push(
                offset,
                req.request,
                KernelUnit::BuiltinCompare {
                    lhs: BuiltinTypeId::Int64,
                    rhs: BuiltinTypeId::Int64,
                    comparison: req.comparison,
                },
            ),
            TypeVariant::Time(_) | TypeVariant::Builtin(_) => Err(req.not_comparable()),
            _ => req.src1_tp.make_comparison_kernel(ckb, offset, req, Side::Rhs),
        }
    }

    fn elwise_property_index(&self, this: &Type, name: &str) -> Result<usize> {
        TimeField::ALL
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| Error::UnknownProperty {
                type_repr: this.to_string(),
                name: name.to_string(),
            })
    }

    fn elwise_property_type(&self, this: &Type, index: usize) -> Result<PropertyInfo> {
        let field = TimeField::from_index(this, index)?;
        Ok(match field {
            TimeField::Struct => PropertyInfo {
                name: field.name(),
                value_type: time_hmst_type(),
                readable: true,
                writable: true,
            },
            _ => PropertyInfo {
                name: field.name(),
                value_type: Type::builtin(BuiltinTypeId::Int32),
                readable: true,
                writable: false,
            },
        })
    }

    fn make_elwise_property_getter_kernel(
        &self,
        this: &Type,
        ckb: &mut KernelBuilder,
        offset: usize,
        _dst_arrmeta: &[u8],
        _src_arrmeta: &[u8],
        property_index: usize,
        request: KernelRequest,
        _errmode: AssignErrorMode,
        _ectx: &EvalContext,
    ) -> Result<usize> {
        let field = TimeField::from_index(this, property_index)?;
        ckb.push(offset, request, KernelUnit::TimeGet(field))
    }

    fn make_elwise_property_setter_kernel(
        &self,
        this: &Type,
        ckb: &mut KernelBuilder,
        offset: usize,
        _dst_arrmeta: &[u8],
        property_index: usize,
        _src_arrmeta: &[u8],
        request: KernelRequest,
        errmode: AssignErrorMode,
        ectx: &EvalContext,
    ) -> Result<usize> {
        match TimeField::from_index(this, property_index)? {
            TimeField::Struct => ckb.push(
                offset,
                request,
                KernelUnit::TimeSetStruct {
                    tz: self.tz,
                    errmode: ectx.resolve(errmode),
                },
            ),
            field => Err(Error::unsupported(
                format!("writing read-only property '{}'", field.name()),
                this,
            )),
        }
    }

    fn dynamic_type_properties(&self) -> Vec<(&'static str, TypePropertyValue)> {
        vec![("tz", TypePropertyValue::Str(self.tz.to_string()))]
    }

    fn dynamic_array_properties(&self) -> BTreeMap<String, Callable> {
        TimeField::ALL[..5]
            .iter()
            .map(|f| (f.name().to_string(), Callable::new(f.name(), f.name())))
            .collect()
    }

    fn dynamic_array_functions(&self) -> BTreeMap<String, Callable> {
        let mut functions = BTreeMap::new();
        functions.insert("to_struct".to_string(), Callable::new("to_struct", TimeField::Struct.name()));
        functions
    }
}

impl fmt::Display for TimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print_type(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{
        make_comparison_kernel, make_elwise_property_getter_kernel, ComparisonType,
    };
    use crate::string_encodings::StringEncoding;

    fn ticks(h: i64, m: i64, s: i64, t: i64) -> i64 {
        h * TICKS_PER_HOUR + m * TICKS_PER_MINUTE + s * TICKS_PER_SECOND + t
    }

    fn render(tp: &Type, v: i64) -> String {
        // SAFETY: v is a time element.
        unsafe { tp.data_to_string(&[], (&v as *const i64).cast()) }.expect("print")
    }

    #[test]
    fn test_zone_names() {
        assert_eq!(Type::time().to_string(), "time");
        assert_eq!(Type::time_with_zone(TimeZone::Utc).to_string(), "time[tz='UTC']");
        assert!(Type::time_with_zone_name("UTC").is_ok());
        let err = Type::time_with_zone_name("America/Chicago").unwrap_err();
        assert!(err.to_string().contains("America/Chicago"));
        assert_ne!(Type::time(), Type::time_with_zone(TimeZone::Utc));
    }

    #[test]
    fn test_print_precision() {
        let tp = Type::time();
        assert_eq!(render(&tp, ticks(9, 5, 0, 0)), "09:05");
        assert_eq!(render(&tp, ticks(9, 5, 7, 0)), "09:05:07");
        assert_eq!(render(&tp, ticks(9, 5, 7, 1_230_000)), "09:05:07.123");
        assert_eq!(render(&tp, ticks(9, 5, 7, 1_234_560)), "09:05:07.123456");
        assert_eq!(render(&tp, ticks(9, 5, 7, 1_234_567)), "09:05:07.1234567");
        assert_eq!(render(&tp, ticks(0, 0, 0, 1)), "00:00:00.0000001");
    }

    #[test]
    fn test_utc_render_and_fields() {
        let tp = Type::time_with_zone(TimeZone::Utc);
        let v = ticks(13, 45, 30, 0);
        assert_eq!(render(&tp, v), "13:45:30Z");

        let mut ckb = KernelBuilder::new();
        let ectx = EvalContext::default();
        let hour = tp.elwise_property_index("hour").expect("hour");
        let minute = tp.elwise_property_index("minute").expect("minute");
        let h_off = 0;
        let m_off = make_elwise_property_getter_kernel(&mut ckb, h_off, &[], &tp, &[], hour, KernelRequest::Single, AssignErrorMode::Default, &ectx)
            .expect("hour kernel");
        make_elwise_property_getter_kernel(&mut ckb, m_off, &[], &tp, &[], minute, KernelRequest::Single, AssignErrorMode::Default, &ectx)
            .expect("minute kernel");
        let (mut h, mut m) = (0i32, 0i32);
        // SAFETY: v is a time element; h and m are int32.
        unsafe {
            ckb.single(h_off, (&mut h as *mut i32).cast(), &[(&v as *const i64).cast()])
                .expect("hour");
            ckb.single(m_off, (&mut m as *mut i32).cast(), &[(&v as *const i64).cast()])
                .expect("minute");
        }
        assert_eq!((h, m), (13, 45));
    }

    #[test]
    fn test_parse_forms() {
        let z = AssignErrorMode::Fractional;
        assert_eq!(parse_ticks("07:30", TimeZone::Abstract, z).expect("hm"), ticks(7, 30, 0, 0));
        assert_eq!(parse_ticks("7:30:15", TimeZone::Abstract, z).expect("hms"), ticks(7, 30, 15, 0));
        assert_eq!(parse_ticks("07:30:15.5", TimeZone::Abstract, z).expect("frac"), ticks(7, 30, 15, 5_000_000));
        assert_eq!(
            parse_ticks("07:30:15.1234567", TimeZone::Abstract, z).expect("ticks"),
            ticks(7, 30, 15, 1_234_567)
        );
        assert!(parse_ticks("07:30:15.12345678", TimeZone::Abstract, z).is_err());
        assert!(parse_ticks("24:00", TimeZone::Abstract, z).is_err());
        assert!(parse_ticks("7h30", TimeZone::Abstract, z).is_err());
    }

    #[test]
    fn test_parse_zone_suffix() {
        let strict = AssignErrorMode::Fractional;
        for s in ["13:45:30Z", "13:45:30UTC", "13:45:30 UTC"] {
            assert_eq!(parse_ticks(s, TimeZone::Utc, strict).expect(s), ticks(13, 45, 30, 0));
        }
        assert!(parse_ticks("13:45:30 PST", TimeZone::Utc, strict).is_err());
        assert!(parse_ticks("13:45:30Z", TimeZone::Abstract, strict).is_err());
        assert!(parse_ticks("13:45:30Z", TimeZone::Abstract, AssignErrorMode::NoCheck).is_ok());
    }

    #[test]
    fn test_invalid_value_names_zoned_type() {
        let tp = Type::time_with_zone(TimeZone::Utc);
        let src_tp = Type::fixed_string(16, StringEncoding::Utf8).expect("fixed_string");
        let mut ckb = KernelBuilder::new();
        crate::kernels::make_assignment_kernel(
            &mut ckb,
            0,
            &tp,
            &[],
            &src_tp,
            &[],
            KernelRequest::Single,
            AssignErrorMode::Default,
            &EvalContext::default(),
        )
        .expect("kernel");
        let mut text = [0u8; 16];
        text[..6].copy_from_slice(b"25:00Z");
        let mut out = 0i64;
        // SAFETY: text is fixed_string[16] data, out a time element.
        let r = unsafe { ckb.single(0, (&mut out as *mut i64).cast(), &[text.as_ptr()]) };
        match r {
            Err(Error::InvalidValue { value, type_repr, .. }) => {
                assert_eq!(value, "\"25:00Z\"");
                assert_eq!(type_repr, "time[tz='UTC']");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_property() {
        let tp = Type::time();
        let idx = tp.elwise_property_index("struct").expect("struct");
        let info = tp.elwise_property_type(idx).expect("info");
        assert!(info.readable && info.writable);
        assert_eq!(info.value_type.to_string(), "{hour: int8, minute: int8, second: int8, tick: int32}");
        assert_eq!(info.value_type.data_size(), std::mem::size_of::<TimeHmst>());

        let hmst = TimeHmst::new(23, 59, 59, 9_999_999);
        let mut v = 0i64;
        // SAFETY: hmst is a TimeHmst record; v a time element.
        unsafe { set_from_struct((&mut v as *mut i64).cast(), (&hmst as *const TimeHmst).cast(), TimeZone::Abstract, AssignErrorMode::Fractional) }
            .expect("set");
        assert_eq!(TimeHmst::from_ticks(v), hmst);

        let bad = TimeHmst::new(25, 0, 0, 0);
        // SAFETY: as above.
        let r = unsafe { set_from_struct((&mut v as *mut i64).cast(), (&bad as *const TimeHmst).cast(), TimeZone::Utc, AssignErrorMode::Fractional) };
        match r {
            Err(Error::InvalidValue { type_repr, .. }) => assert_eq!(type_repr, "time[tz='UTC']"),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_hour_is_read_only() {
        let tp = Type::time();
        let idx = tp.elwise_property_index("hour").expect("hour");
        assert!(!tp.elwise_property_type(idx).expect("info").writable);
        let mut ckb = KernelBuilder::new();
        let r = crate::kernels::make_elwise_property_setter_kernel(
            &mut ckb,
            0,
            &tp,
            &[],
            idx,
            &[],
            KernelRequest::Single,
            AssignErrorMode::Default,
            &EvalContext::default(),
        );
        assert!(matches!(r, Err(Error::Unsupported { .. })));
        assert!(ckb.is_empty());
        assert!(matches!(tp.elwise_property_index("weekday"), Err(Error::UnknownProperty { .. })));
    }

    #[test]
    fn test_utc_vs_abstract_not_comparable() {
        let mut ckb = KernelBuilder::new();
        let r = make_comparison_kernel(
            &mut ckb,
            0,
            &Type::time_with_zone(TimeZone::Utc),
            &[],
            &Type::time(),
            &[],
            ComparisonType::Equal,
            KernelRequest::Single,
            &EvalContext::default(),
        );
        assert!(matches!(r, Err(Error::NotComparable { .. })));
        assert!(ckb.is_empty());
    }

    #[test]
    fn test_registries() {
        let tp = Type::time_with_zone(TimeZone::Utc);
        assert_eq!(tp.type_property("tz").expect("tz"), TypePropertyValue::Str("UTC".to_string()));
        let props = tp.dynamic_array_properties();
        assert_eq!(props.keys().cloned().collect::<Vec<_>>(), ["hour", "microsecond", "minute", "second", "tick"]);
        let to_struct = &tp.dynamic_array_functions()["to_struct"];
        let viewed = to_struct.call(&Type::fixed_dim(3, tp.clone()).expect("dim")).expect("call");
        assert_eq!(
            viewed.to_string(),
            "3 * property[operand=time[tz='UTC'], name='struct']"
        );
    }
}
