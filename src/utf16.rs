//! UTF-16 Recoder Module
//!
//! UTF-16コードユニット（サロゲートペアを含む）をUTF-8に変換するモジュール。
//! PPTとXLSBの両方のデコーダーが使用します。
//!
//! サロゲートペアは`(high << 16) | low`の32ビット値にまとめてから、
//! ビットシフトとマスクでUTF-8のバイト列へ詰め直します。

/// UTF-16コードユニットが上位サロゲートかどうか
///
/// 上位6ビットが`0b110110`（`0xD800..=0xDBFF`）の場合に`true`。
pub fn is_high_surrogate(unit: u16) -> bool {
    (unit & 0xFC00) == 0xD800
}

/// サロゲートペアを1つの32ビット値にまとめる
///
/// 返り値は`encode_unit`にそのまま渡せる形式です（`0x10000`以上になります）。
pub fn pack_surrogate_pair(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

/// コードユニット（またはまとめたサロゲートペア）をUTF-8のバイト列へ詰める
///
/// # 戻り値
///
/// `(バイト列, 有効なバイト数)`。
/// 1バイト（`< 0x80`）、2バイト（`< 0x800`）、3バイト（`< 0x10000`）、それ以外は4バイト。
/// 4バイトの場合、入力は`pack_surrogate_pair`の結果として解釈されます。
pub fn pack_utf8(unit: u32) -> ([u8; 4], usize) {
    let mut out = [0u8; 4];
    if unit < 0x80 {
        out[0] = unit as u8;
        (out, 1)
    } else if unit < 0x800 {
        out[0] = 0xC0 | (unit >> 6) as u8;
        out[1] = 0x80 | (unit & 0x3F) as u8;
        (out, 2)
    } else if unit < 0x10000 {
        out[0] = 0xE0 | (unit >> 12) as u8;
        out[1] = 0x80 | ((unit & 0x0FFF) >> 6) as u8;
        out[2] = 0x80 | (unit & 0x3F) as u8;
        (out, 3)
    } else {
        let low_bits = unit & 0x03FF;
        let scalar = (((unit & 0x03FF_0000) >> 6) | low_bits) + 0x10000;
        out[0] = 0xF0 | (scalar >> 18) as u8;
        out[1] = 0x80 | ((scalar & 0x0003_FFFF) >> 12) as u8;
        out[2] = 0x80 | ((scalar & 0x0FFF) >> 6) as u8;
        out[3] = 0x80 | (scalar & 0x3F) as u8;
        (out, 4)
    }
}

/// コードユニットをUTF-8に変換し、`buf`を借用した文字列スライスとして返す
///
/// 単独のサロゲートなど、詰めた結果が正しいUTF-8にならない場合は
/// U+FFFD（置換文字）を返します。
pub fn encode_unit_into(unit: u32, buf: &mut [u8; 4]) -> &str {
    let (bytes, len) = pack_utf8(unit);
    *buf = bytes;
    match std::str::from_utf8(&buf[..len]) {
        Ok(s) => s,
        Err(_) => {
            log::warn!("Invalid UTF-16 code unit 0x{:X} replaced", unit);
            "\u{FFFD}"
        }
    }
}

/// コードユニットをUTF-8文字列に変換する
///
/// # 使用例
///
/// ```rust
/// use docparser::utf16::{encode_unit, pack_surrogate_pair};
///
/// assert_eq!(encode_unit(0x41), "A");
/// assert_eq!(encode_unit(0x3042), "あ");
/// assert_eq!(encode_unit(pack_surrogate_pair(0xD83D, 0xDE00)), "😀");
/// assert_eq!(encode_unit(0xD800), "\u{FFFD}");
/// ```
pub fn encode_unit(unit: u32) -> String {
    let mut buf = [0u8; 4];
    encode_unit_into(unit, &mut buf).to_string()
}

/// UTF-16コードユニット列をUTF-8文字列に変換する
///
/// 上位サロゲートの直後にユニットが残っていれば、それとペアにします。
pub fn decode_units(units: &[u16]) -> String {
    let mut out = String::with_capacity(units.len());
    let mut buf = [0u8; 4];
    let mut i = 0;
    while i < units.len() {
        let mut unit = u32::from(units[i]);
        if is_high_surrogate(units[i]) && i + 1 < units.len() {
            i += 1;
            unit = pack_surrogate_pair(units[i - 1], units[i]);
        }
        out.push_str(encode_unit_into(unit, &mut buf));
        i += 1;
    }
    out
}
