// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! String types.
//!
//! A variable-length `string` element is a `(begin, end)` pointer pair
//! into a pod memory block referenced from the arrmeta. A `fixed_string`
//! element stores its code units inline, zero-padded.

use std::fmt;

use super::{Type, TypeFlags, TypeHeader, TypeId, TypeKind, TypeOps, TypeVariant};
use crate::arrmeta::{
    blockref_is_unique, construct_blockref, copy_blockref, debug_print_blockref, destruct_blockref,
    finalize_blockref, read_blockref, reset_blockref,
};
use crate::config::{AssignErrorMode, BLOCKREF_ARRMETA_SIZE, STRING_DATA_SIZE};
use crate::error::{Error, Result};
use crate::kernels::{
    AssignRequest, CompareRequest, ComparisonType, KernelBuilder, KernelUnit, Side,
};
use crate::memblock::{global_arena, BlockRef};
use crate::string_encodings::{fixed_string_len, print_escaped, StringEncoding};

/// Variable-length string descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringType {
    pub encoding: StringEncoding,
}

/// Fixed-size string descriptor; `size` counts code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedStringType {
    pub size: usize,
    pub encoding: StringEncoding,
}

impl Type {
    pub fn string(encoding: StringEncoding) -> Type {
        Type::from_variant(TypeVariant::String(StringType { encoding }))
    }

    pub fn fixed_string(size: usize, encoding: StringEncoding) -> Result<Type> {
        if size == 0 {
            return Err(Error::InvalidArgument("fixed_string size must be positive".to_string()));
        }
        Ok(Type::from_variant(TypeVariant::FixedString(FixedStringType { size, encoding })))
    }
}

// ============================================================================
// Element layout
// ============================================================================

/// Storage form of a string element, as carried by kernel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringLayout {
    Variable(StringEncoding),
    /// `size` is in bytes.
    Fixed { size: usize, encoding: StringEncoding },
}

impl StringLayout {
    pub(crate) fn of(tp: &Type) -> Option<StringLayout> {
        match tp.variant() {
            TypeVariant::String(s) => Some(StringLayout::Variable(s.encoding)),
            TypeVariant::FixedString(s) => Some(StringLayout::Fixed {
                size: s.size * s.encoding.unit_size(),
                encoding: s.encoding,
            }),
            _ => None,
        }
    }

    pub(crate) fn encoding(self) -> StringEncoding {
        match self {
            StringLayout::Variable(e) | StringLayout::Fixed { encoding: e, .. } => e,
        }
    }

    /// Encoded bytes of one element.
    ///
    /// # Safety
    ///
    /// `data` must point to a valid element of this layout, and the
    /// memory it references must outlive the returned slice.
    pub(crate) unsafe fn read<'a>(self, data: *const u8) -> &'a [u8] {
        match self {
            StringLayout::Variable(_) => {
                let (begin, end) = read_pointers(data);
                if begin.is_null() || end <= begin {
                    &[]
                } else {
                    std::slice::from_raw_parts(begin, end.offset_from(begin) as usize)
                }
            }
            StringLayout::Fixed { size, encoding } => {
                let all = std::slice::from_raw_parts(data, size);
                &all[..fixed_string_len(all, encoding)]
            }
        }
    }

    /// Store already-encoded bytes into one element.
    ///
    /// # Safety
    ///
    /// `dst` must point to a writable element of this layout.
    pub(crate) unsafe fn store(
        self,
        block: BlockRef,
        dst: *mut u8,
        bytes: &[u8],
        errmode: AssignErrorMode,
    ) -> Result<()> {
        match self {
            StringLayout::Variable(encoding) => {
                if bytes.is_empty() {
                    write_pointers(dst, std::ptr::null(), std::ptr::null());
                    return Ok(());
                }
                if block.is_null() {
                    return Err(Error::InvalidArrmeta(
                        "string destination has no memory block".to_string(),
                    ));
                }
                let p = global_arena().pod_allocate(block, bytes.len(), encoding.unit_size())?;
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), p, bytes.len());
                write_pointers(dst, p, p.add(bytes.len()));
                Ok(())
            }
            StringLayout::Fixed { size, encoding } => {
                let n = if bytes.len() > size {
                    if errmode != AssignErrorMode::NoCheck {
                        return Err(Error::invalid_value(
                            format!("string of {} bytes", bytes.len()),
                            &self,
                            "string is too large for the destination",
                        ));
                    }
                    truncation_point(bytes, size, encoding)
                } else {
                    bytes.len()
                };
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, n);
                std::ptr::write_bytes(dst.add(n), 0, size - n);
                Ok(())
            }
        }
    }
}

impl fmt::Display for StringLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringLayout::Variable(e) => print_string_type(f, *e),
            StringLayout::Fixed { size, encoding } => {
                print_fixed_string_type(f, size / encoding.unit_size(), *encoding)
            }
        }
    }
}

unsafe fn read_pointers(data: *const u8) -> (*const u8, *const u8) {
    let begin = data.cast::<*const u8>().read_unaligned();
    let end = data.add(std::mem::size_of::<usize>()).cast::<*const u8>().read_unaligned();
    (begin, end)
}

unsafe fn write_pointers(data: *mut u8, begin: *const u8, end: *const u8) {
    data.cast::<*const u8>().write_unaligned(begin);
    data.add(std::mem::size_of::<usize>()).cast::<*const u8>().write_unaligned(end);
}

/// Largest prefix length `<= size` ending on a codepoint boundary.
fn truncation_point(bytes: &[u8], size: usize, encoding: StringEncoding) -> usize {
    let unit = encoding.unit_size();
    let mut n = size - size % unit;
    match encoding {
        StringEncoding::Utf8 => {
            while n > 0 && n < bytes.len() && bytes[n] & 0xC0 == 0x80 {
                n -= 1;
            }
        }
        StringEncoding::Utf16 => {
            if n >= 2 && n < bytes.len() {
                let next = u16::from_ne_bytes([bytes[n], bytes[n + 1]]);
                if (0xDC00..0xE000).contains(&next) {
                    n -= 2;
                }
            }
        }
        _ => {}
    }
    n
}

fn print_string_type(f: &mut dyn fmt::Write, encoding: StringEncoding) -> fmt::Result {
    if encoding == StringEncoding::Utf8 {
        f.write_str("string")
    } else {
        write!(f, "string['{}']", encoding)
    }
}

fn print_fixed_string_type(
    f: &mut dyn fmt::Write,
    size: usize,
    encoding: StringEncoding,
) -> fmt::Result {
    if encoding == StringEncoding::Utf8 {
        write!(f, "fixed_string[{}]", size)
    } else {
        write!(f, "fixed_string[{}, '{}']", size, encoding)
    }
}

// ============================================================================
// Element operations used by kernel units
// ============================================================================

/// Decode one element into a Rust string.
///
/// # Safety
///
/// `data` must point to a valid element of `layout`.
pub(crate) unsafe fn read_utf8(
    layout: StringLayout,
    data: *const u8,
    errmode: AssignErrorMode,
) -> Result<String> {
    let codec = layout.encoding().codec(errmode);
    let mut out = String::new();
    for cp in codec.codepoints(layout.read(data)) {
        let cp = cp?;
        match char::from_u32(cp) {
            Some(c) => out.push(c),
            None if codec.strict => {
                return Err(Error::invalid_value(format!("U+{:04X}", cp), &layout, "not a unicode scalar value"));
            }
            None => out.push(char::REPLACEMENT_CHARACTER),
        }
    }
    Ok(out)
}

/// Encode `text` into one element.
///
/// # Safety
///
/// `dst` must point to a writable element of `layout`.
pub(crate) unsafe fn store_utf8(
    layout: StringLayout,
    block: BlockRef,
    dst: *mut u8,
    text: &str,
    errmode: AssignErrorMode,
) -> Result<()> {
    let codec = layout.encoding().codec(errmode);
    let mut bytes = Vec::with_capacity(text.len() * layout.encoding().unit_size());
    for c in text.chars() {
        codec.append_codepoint(u32::from(c), &mut bytes)?;
    }
    layout.store(block, dst, &bytes, errmode)
}

/// Re-encode one string element into another.
///
/// # Safety
///
/// `dst` and `src` must point to elements of their layouts.
pub(crate) unsafe fn assign(
    dst_layout: StringLayout,
    dst_block: BlockRef,
    dst: *mut u8,
    src_layout: StringLayout,
    src: *const u8,
    errmode: AssignErrorMode,
) -> Result<()> {
    let bytes = src_layout.read(src);
    let (src_enc, dst_enc) = (src_layout.encoding(), dst_layout.encoding());
    if src_enc == dst_enc {
        return dst_layout.store(dst_block, dst, bytes, errmode);
    }
    let encoded = src_enc.codec(errmode).transcode(bytes, &dst_enc.codec(errmode))?;
    dst_layout.store(dst_block, dst, &encoded, errmode)
}

/// Compare two string elements codepoint by codepoint.
///
/// # Safety
///
/// `a` and `b` must point to elements of their layouts.
pub(crate) unsafe fn compare(
    lhs: StringLayout,
    a: *const u8,
    rhs: StringLayout,
    b: *const u8,
    comparison: ComparisonType,
) -> Result<bool> {
    let (a, b) = (lhs.read(a), rhs.read(b));
    if lhs.encoding() == rhs.encoding() && lhs.encoding() == StringEncoding::Utf8 {
        // UTF-8 byte order is codepoint order.
        return Ok(comparison.holds(Some(a.cmp(b))));
    }
    let decode = |layout: StringLayout, bytes: &[u8]| -> Result<Vec<u32>> {
        layout
            .encoding()
            .codec(AssignErrorMode::Fractional)
            .codepoints(bytes)
            .collect()
    };
    let (x, y) = (decode(lhs, a)?, decode(rhs, b)?);
    Ok(comparison.holds(Some(x.cmp(&y))))
}

fn can_represent(dst: StringEncoding, src: StringEncoding) -> bool {
    dst == src
        || matches!(dst, StringEncoding::Utf8 | StringEncoding::Utf16 | StringEncoding::Utf32)
        || (dst == StringEncoding::Ucs2 && src == StringEncoding::Ascii)
}

// ============================================================================
// Kernel resolution shared by both string variants
// ============================================================================

fn make_string_assignment(
    dst: StringLayout,
    ckb: &mut KernelBuilder,
    offset: usize,
    req: &AssignRequest<'_>,
    side: Side,
) -> Result<usize> {
    if side == Side::Rhs {
        return Err(req.unsupported());
    }
    let dst_block = match dst {
        StringLayout::Variable(_) => read_blockref(req.dst_arrmeta, 0),
        StringLayout::Fixed { .. } => BlockRef::NULL,
    };
    if let Some(src) = StringLayout::of(req.src_tp) {
        return ckb.push(
            offset,
            req.request,
            KernelUnit::StringAssign {
                dst,
                dst_block,
                src,
                errmode: req.errmode,
            },
        );
    }
    if req.src_tp.is_builtin() || req.src_tp.type_id() == TypeId::Time {
        return ckb.push(
            offset,
            req.request,
            KernelUnit::FormatToString {
                dst,
                dst_block,
                src_tp: req.src_tp.clone(),
                errmode: req.errmode,
            },
        );
    }
    req.src_tp.make_assignment_kernel(ckb, offset, req, Side::Rhs)
}

fn make_string_comparison(
    lhs: StringLayout,
    ckb: &mut KernelBuilder,
    offset: usize,
    req: &CompareRequest<'_>,
    side: Side,
) -> Result<usize> {
    match (side, StringLayout::of(req.src1_tp)) {
        (Side::Lhs, Some(rhs)) => ckb.push(
            offset,
            req.request,
            KernelUnit::StringCompare {
                lhs,
                rhs,
                comparison: req.comparison,
            },
        ),
        (Side::Lhs, None) => req.src1_tp.make_comparison_kernel(ckb, offset, req, Side::Rhs),
        (Side::Rhs, _) => Err(req.not_comparable()),
    }
}

impl TypeOps for StringType {
    fn header(&self) -> TypeHeader {
        TypeHeader {
            type_id: TypeId::String,
            kind: TypeKind::String,
            data_size: STRING_DATA_SIZE,
            data_alignment: std::mem::align_of::<usize>(),
            arrmeta_size: BLOCKREF_ARRMETA_SIZE,
            flags: TypeFlags::BLOCKREF,
            ndim: 0,
        }
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        print_string_type(f, self.encoding)
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        _arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        print_escaped(out, StringLayout::Variable(self.encoding).read(data), self.encoding)
    }

    fn is_unique_data_owner(&self, arrmeta: &[u8]) -> bool {
        blockref_is_unique(arrmeta, 0)
    }

    fn is_lossless_assignment(&self, dst: &Type, src: &Type) -> bool {
        match (StringLayout::of(dst), StringLayout::of(src)) {
            (Some(StringLayout::Variable(d)), Some(s)) => can_represent(d, s.encoding()),
            _ => false,
        }
    }

    fn arrmeta_default_construct(
        &self,
        arrmeta: &mut [u8],
        _shape: &[isize],
        blockref_alloc: bool,
    ) -> Result<()> {
        construct_blockref(arrmeta, 0, blockref_alloc);
        Ok(())
    }

    fn arrmeta_copy_construct(
        &self,
        dst: &mut [u8],
        src: &[u8],
        embedded: Option<BlockRef>,
    ) -> Result<()> {
        copy_blockref(dst, src, 0, embedded)
    }

    fn arrmeta_reset_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
        reset_blockref(arrmeta, 0)
    }

    fn arrmeta_finalize_buffers(&self, arrmeta: &mut [u8]) -> Result<()> {
        finalize_blockref(arrmeta, 0)
    }

    fn arrmeta_destruct(&self, arrmeta: &mut [u8]) {
        destruct_blockref(arrmeta, 0);
    }

    fn arrmeta_debug_print(
        &self,
        arrmeta: &[u8],
        out: &mut dyn fmt::Write,
        indent: &str,
    ) -> fmt::Result {
        writeln!(out, "{}string arrmeta", indent)?;
        debug_print_blockref(arrmeta, 0, out, &format!("{} ", indent))
    }

    fn make_assignment_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &AssignRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        make_string_assignment(StringLayout::Variable(self.encoding), ckb, offset, req, side)
    }

    fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &CompareRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        make_string_comparison(StringLayout::Variable(self.encoding), ckb, offset, req, side)
    }
}

impl FixedStringType {
    fn layout(&self) -> StringLayout {
        StringLayout::Fixed {
            size: self.size * self.encoding.unit_size(),
            encoding: self.encoding,
        }
    }
}

impl TypeOps for FixedStringType {
    fn header(&self) -> TypeHeader {
        let unit = self.encoding.unit_size();
        TypeHeader::scalar(TypeId::FixedString, TypeKind::String, self.size * unit, unit)
    }

    fn print_type(&self, f: &mut dyn fmt::Write) -> fmt::Result {
        print_fixed_string_type(f, self.size, self.encoding)
    }

    unsafe fn print_data(
        &self,
        out: &mut dyn fmt::Write,
        _arrmeta: &[u8],
        data: *const u8,
    ) -> fmt::Result {
        print_escaped(out, self.layout().read(data), self.encoding)
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
        make_string_assignment(self.layout(), ckb, offset, req, side)
    }

    fn make_comparison_kernel(
        &self,
        ckb: &mut KernelBuilder,
        offset: usize,
        req: &CompareRequest<'_>,
        side: Side,
    ) -> Result<usize> {
        make_string_comparison(self.layout(), ckb, offset, req, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrmeta::Arrmeta;
    use crate::config::EvalContext;
    use crate::kernels::{make_assignment_kernel, make_comparison_kernel, KernelRequest};
    use crate::types::BuiltinTypeId;

    #[repr(C, align(8))]
    struct Elem([u8; 16]);

    fn store(layout: StringLayout, block: BlockRef, text: &str) -> Elem {
        let mut e = Elem([0; 16]);
        // SAFETY: Elem is a 16-byte string element.
        unsafe { store_utf8(layout, block, e.0.as_mut_ptr(), text, AssignErrorMode::Fractional) }
            .expect("store");
        e
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Type::string(StringEncoding::Utf8).to_string(), "string");
        assert_eq!(Type::string(StringEncoding::Utf16).to_string(), "string['utf16']");
        let fs = Type::fixed_string(10, StringEncoding::Ascii).expect("fixed_string");
        assert_eq!(fs.to_string(), "fixed_string[10, 'ascii']");
        assert_eq!(fs.data_size(), 10);
        let fs = Type::fixed_string(4, StringEncoding::Utf32).expect("fixed_string");
        assert_eq!((fs.data_size(), fs.data_alignment()), (16, 4));
        assert!(Type::fixed_string(0, StringEncoding::Utf8).is_err());
    }

    #[test]
    fn test_store_read_print() {
        let tp = Type::string(StringEncoding::Utf8);
        let am = Arrmeta::default_construct(&tp, &[], true).expect("arrmeta");
        let layout = StringLayout::Variable(StringEncoding::Utf8);
        let e = store(layout, read_blockref(am.as_bytes(), 0), "h\u{e9}\"llo");
        // SAFETY: e holds a string element backed by am's block.
        unsafe {
            assert_eq!(read_utf8(layout, e.0.as_ptr(), AssignErrorMode::Fractional).expect("read"), "h\u{e9}\"llo");
            assert_eq!(tp.data_to_string(am.as_bytes(), e.0.as_ptr()).expect("print"), "\"h\u{e9}\\\"llo\"");
        }
    }

    #[test]
    fn test_reencode_kernel() {
        let ectx = EvalContext::default();
        let src_tp = Type::string(StringEncoding::Utf8);
        let dst_tp = Type::string(StringEncoding::Utf16);
        let src_am = Arrmeta::default_construct(&src_tp, &[], true).expect("src");
        let dst_am = Arrmeta::default_construct(&dst_tp, &[], true).expect("dst");
        let src = store(
            StringLayout::Variable(StringEncoding::Utf8),
            read_blockref(src_am.as_bytes(), 0),
            "a\u{1F600}",
        );
        let mut dst = Elem([0; 16]);
        let mut ckb = KernelBuilder::new();
        make_assignment_kernel(
            &mut ckb,
            0,
            &dst_tp,
            dst_am.as_bytes(),
            &src_tp,
            src_am.as_bytes(),
            KernelRequest::Single,
            AssignErrorMode::Default,
            &ectx,
        )
        .expect("resolve");
        // SAFETY: both elements are strings backed by their arrmeta blocks.
        unsafe {
            ckb.single(0, dst.0.as_mut_ptr(), &[src.0.as_ptr()]).expect("run");
            let layout = StringLayout::Variable(StringEncoding::Utf16);
            assert_eq!(layout.read(dst.0.as_ptr()).len(), 6);
            assert_eq!(read_utf8(layout, dst.0.as_ptr(), AssignErrorMode::Fractional).expect("read"), "a\u{1F600}");
        }
    }

    #[test]
    fn test_fixed_string_overflow() {
        let layout = StringLayout::Fixed {
            size: 4,
            encoding: StringEncoding::Utf8,
        };
        let mut buf = [0xffu8; 4];
        // SAFETY: buf is a 4-byte fixed string element.
        unsafe {
            assert!(store_utf8(layout, BlockRef::NULL, buf.as_mut_ptr(), "abcdef", AssignErrorMode::Overflow).is_err());
            store_utf8(layout, BlockRef::NULL, buf.as_mut_ptr(), "abc\u{e9}", AssignErrorMode::NoCheck).expect("truncate");
        }
        assert_eq!(&buf, b"abc\0");
    }

    #[test]
    fn test_int_to_string() {
        let ectx = EvalContext::default();
        let dst_tp = Type::fixed_string(8, StringEncoding::Ascii).expect("fixed_string");
        let src_tp = Type::builtin(BuiltinTypeId::Int32);
        let mut ckb = KernelBuilder::new();
        make_assignment_kernel(
            &mut ckb,
            0,
            &dst_tp,
            &[],
            &src_tp,
            &[],
            KernelRequest::Single,
            AssignErrorMode::Default,
            &ectx,
        )
        .expect("resolve");
        let src = -42i32;
        let mut dst = [0u8; 8];
        // SAFETY: dst is an 8-byte ascii fixed string; src an int32.
        unsafe { ckb.single(0, dst.as_mut_ptr(), &[(&src as *const i32).cast()]) }.expect("run");
        assert_eq!(&dst[..4], b"-42\0");
    }

    #[test]
    fn test_compare_across_encodings() {
        let ectx = EvalContext::default();
        let a_tp = Type::fixed_string(3, StringEncoding::Ascii).expect("a");
        let b_tp = Type::fixed_string(3, StringEncoding::Utf32).expect("b");
        let mut ckb = KernelBuilder::new();
        make_comparison_kernel(
            &mut ckb,
            0,
            &a_tp,
            &[],
            &b_tp,
            &[],
            ComparisonType::LessThan,
            KernelRequest::Single,
            &ectx,
        )
        .expect("resolve");
        let a = *b"abc";
        let mut b = [0u8; 12];
        for (i, c) in "abd".chars().enumerate() {
            b[i * 4..i * 4 + 4].copy_from_slice(&u32::from(c).to_ne_bytes());
        }
        // SAFETY: a and b match their fixed string layouts.
        let lt = unsafe { ckb.compare(0, a.as_ptr(), b.as_ptr()) }.expect("compare");
        assert!(lt);
    }

    #[test]
    fn test_lossless() {
        let utf8 = Type::string(StringEncoding::Utf8);
        let ascii = Type::string(StringEncoding::Ascii);
        assert!(Type::is_lossless_assignment(&utf8, &ascii));
        assert!(!Type::is_lossless_assignment(&ascii, &utf8));
    }
}
