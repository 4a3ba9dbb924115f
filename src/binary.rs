//! Binary Cursor Module
//!
//! PPT・XLSBのレコードストリームを読むための、境界チェック付きリトルエンディアンリーダー。

use crate::error::DocParserError;

/// メモリ上のバイト列に対する読み取りカーソル
///
/// 読み取りに必要なバイト数が残っていない場合は`DocParserError::UnexpectedEof`を返し、
/// 位置は進めません。呼び出し側はこれを「このストリームの解析を終える」合図として扱います。
///
/// # 不変条件
///
/// - 常に`0 <= position() <= len`
///
/// # 使用例
///
/// ```rust
/// use docparser::BinaryCursor;
///
/// let data = [0x34, 0x12, 0xFF];
/// let mut cursor = BinaryCursor::new(&data);
/// assert_eq!(cursor.read_u16().unwrap(), 0x1234);
/// assert!(cursor.read_u16().is_err());
/// assert_eq!(cursor.position(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct BinaryCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryCursor<'a> {
    /// バイト列の先頭を指すカーソルを生成
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// 現在の読み取り位置
    pub fn position(&self) -> usize {
        self.position
    }

    /// 残りのバイト数
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// 末尾に到達したかどうか
    pub fn is_at_end(&self) -> bool {
        self.position >= self.data.len()
    }

    /// `n`バイトをそのまま読み取る
    ///
    /// # 戻り値
    ///
    /// * `Ok(&[u8])` - 読み取ったバイト列（元のバッファを借用）
    /// * `Err(DocParserError::UnexpectedEof)` - 残りが`n`バイト未満の場合（位置は変わらない）
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DocParserError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(DocParserError::UnexpectedEof {
                needed: n,
                remaining,
            });
        }
        let data = self.data;
        let bytes = &data[self.position..self.position + n];
        self.position += n;
        Ok(bytes)
    }

    /// `width`バイト（1〜8）の符号なし整数をリトルエンディアンで読み取る
    ///
    /// # 引数
    ///
    /// * `width` - バイト幅。8を超える場合は`MalformedRecord`エラー（位置は進まない）
    pub fn read_uint_le(&mut self, width: usize) -> Result<u64, DocParserError> {
        if width > 8 {
            return Err(DocParserError::MalformedRecord(format!(
                "Integer width {} exceeds 8 bytes",
                width
            )));
        }
        let bytes = self.read_bytes(width)?;
        Ok(bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte)))
    }

    /// 1バイト読み取る
    pub fn read_u8(&mut self) -> Result<u8, DocParserError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// 2バイトのリトルエンディアン整数を読み取る
    pub fn read_u16(&mut self) -> Result<u16, DocParserError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// 4バイトのリトルエンディアン整数を読み取る
    pub fn read_u32(&mut self) -> Result<u32, DocParserError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// 8バイトのIEEE-754倍精度浮動小数点数をリトルエンディアンで読み取る
    ///
    /// XLSBのXnum型もこの形式です。
    pub fn read_f64_le(&mut self) -> Result<f64, DocParserError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    /// `n`バイト読み飛ばす（末尾を超える分は切り捨て）
    ///
    /// # 戻り値
    ///
    /// 実際に読み飛ばしたバイト数
    pub fn skip(&mut self, n: usize) -> usize {
        let skipped = n.min(self.remaining());
        self.position += skipped;
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_little_endian_integers() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut cursor = BinaryCursor::new(&data);
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16().unwrap(), 0x0302);
        assert_eq!(cursor.read_u32().unwrap(), 0x0706_0504);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_read_uint_le_width() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut cursor = BinaryCursor::new(&data);
        assert_eq!(cursor.read_uint_le(3).unwrap(), 0x00CC_BBAA);
        assert_eq!(cursor.read_uint_le(0).unwrap(), 0);
        assert!(matches!(
            cursor.read_uint_le(9),
            Err(DocParserError::MalformedRecord(_))
        ));
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_short_read_does_not_advance() {
        let data = [0x01, 0x02, 0x03];
        let mut cursor = BinaryCursor::new(&data);
        cursor.read_u8().unwrap();

        match cursor.read_u32() {
            Err(DocParserError::UnexpectedEof { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 2);
            }
            other => panic!("Expected UnexpectedEof, got {:?}", other),
        }
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_u16().unwrap(), 0x0302);
    }

    #[test]
    fn test_read_f64_le() {
        let data = 3.25f64.to_le_bytes();
        let mut cursor = BinaryCursor::new(&data);
        assert_eq!(cursor.read_f64_le().unwrap(), 3.25);

        let data = (-1234.5f64).to_le_bytes();
        let mut cursor = BinaryCursor::new(&data);
        assert_eq!(cursor.read_f64_le().unwrap(), -1234.5);
    }

    #[test]
    fn test_skip_is_clamped() {
        let data = [0u8; 10];
        let mut cursor = BinaryCursor::new(&data);
        assert_eq!(cursor.skip(4), 4);
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.skip(100), 6);
        assert_eq!(cursor.position(), 10);
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.skip(1), 0);
    }

    #[test]
    fn test_empty_buffer() {
        let mut cursor = BinaryCursor::new(&[]);
        assert!(cursor.is_at_end());
        assert!(cursor.read_u8().is_err());
        assert_eq!(cursor.position(), 0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_position_stays_in_bounds(
                data in proptest::collection::vec(any::<u8>(), 0..64),
                ops in proptest::collection::vec((0u8..4, 0usize..16), 0..32)
            ) {
                let mut cursor = BinaryCursor::new(&data);
                for (op, n) in ops {
                    let _ = match op {
                        0 => cursor.read_u16().map(u64::from),
                        1 => cursor.read_u32().map(u64::from),
                        2 => cursor.read_uint_le(n % 9),
                        _ => Ok(cursor.skip(n) as u64),
                    };
                    prop_assert!(cursor.position() <= data.len());
                }
            }
        }
    }
}
