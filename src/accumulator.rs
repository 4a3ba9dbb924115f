//! Text Accumulator Module
//!
//! すべてのフォーマットパーサーが共有する、バイト予算付きのテキストバッファ。
//! 切り詰め判定はこのモジュールの`append`だけで行われます。

use log::info;

/// 文末記号を探す範囲（切り詰め位置から遡るバイト数）
const SENTENCE_WINDOW: usize = 50;

/// 空白を探す範囲（切り詰め位置から遡るバイト数）
const WORD_WINDOW: usize = 20;

/// バイト予算付きテキストアキュムレーター
///
/// 上限が設定されていない場合は単純な連結として動作します（従来の動作）。
/// 上限が設定されている場合、バッファのバイト長は決して上限を超えません。
///
/// # 不変条件
///
/// - `truncated`が一度`true`になると、同じ変換中に`false`へ戻ることはない
/// - 上限設定時は常に`text().len() <= limit`
///
/// # 使用例
///
/// ```rust
/// use docparser::TextAccumulator;
///
/// let mut acc = TextAccumulator::new();
/// acc.set_limit(12);
/// assert!(acc.append("Hello "));
/// assert!(!acc.append("world. Bye"));
/// assert_eq!(acc.text(), "Hello world.");
/// assert!(acc.is_truncated());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TextAccumulator {
    /// 蓄積されたテキスト
    buffer: String,
    /// バイト上限（`None`の場合は無制限）
    limit: Option<usize>,
    /// 切り詰めが発生したかどうか
    truncated: bool,
}

impl TextAccumulator {
    /// 無制限のアキュムレーターを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// バイト上限付きのアキュムレーターを生成
    pub fn with_limit(max_bytes: usize) -> Self {
        let mut acc = Self::new();
        acc.set_limit(max_bytes);
        acc
    }

    /// バイト上限を設定し、切り詰めフラグをリセットする
    ///
    /// 上限0も有効な設定です（以降の`append`はすべて拒否されます）。
    pub fn set_limit(&mut self, max_bytes: usize) {
        self.limit = Some(max_bytes);
        self.truncated = false;
    }

    /// テキストを追加する（唯一の変更操作）
    ///
    /// # 戻り値
    ///
    /// * `true` - テキスト全体が追加された場合
    /// * `false` - 上限に達したため、一部または全部が追加されなかった場合
    ///
    /// 上限を超える場合は、文末・単語境界を優先して残りのバイト数に収まるよう
    /// 切り詰めたうえで追加し、切り詰めフラグを立てます。
    /// 一度切り詰めが発生した後の呼び出しは、バッファを変更せずに`false`を返します。
    pub fn append(&mut self, text: &str) -> bool {
        // 空文字列は状態を変えない
        if text.is_empty() {
            return !self.truncated;
        }

        let Some(limit) = self.limit else {
            self.buffer.push_str(text);
            return true;
        };

        if limit == 0 || self.truncated {
            self.truncated = true;
            return false;
        }

        let current = self.buffer.len();
        if current >= limit {
            self.truncated = true;
            return false;
        }

        if current + text.len() <= limit {
            self.buffer.push_str(text);
            return true;
        }

        let remaining = limit - current;
        let kept = truncate_at_boundary(text, remaining);
        self.buffer.push_str(kept);
        self.truncated = true;
        info!(
            "Text truncated at {} bytes (kept {} of {} incoming bytes)",
            limit,
            kept.len(),
            text.len()
        );
        false
    }

    /// 1文字を追加する
    pub fn append_char(&mut self, ch: char) -> bool {
        let mut buf = [0u8; 4];
        self.append(ch.encode_utf8(&mut buf))
    }

    /// 以降の処理を打ち切るべきかどうか
    ///
    /// 上限が設定されており、バッファが上限に達している場合に`true`。
    /// パーサーはページ・段落・レコードなどの作業単位ごとにこれを確認します。
    pub fn should_stop(&self) -> bool {
        matches!(self.limit, Some(limit) if self.buffer.len() >= limit)
    }

    /// 次の作業単位に進まずに打ち切ってよいかどうか
    ///
    /// バッファが上限に達し、かつ追加が一度拒否された後に`true`。
    /// 上限ちょうどまで埋まっただけの場合は`false`のままで、次の単位を`append`に
    /// 渡すことで、テキストが実際に欠落したか（切り詰めフラグ）が判定されます。
    pub fn stop_requested(&self) -> bool {
        self.truncated && self.should_stop()
    }

    /// 切り詰めが発生したかどうか
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// 設定されているバイト上限
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// 蓄積されたテキスト
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// 蓄積されたバイト数
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// バッファが空かどうか
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// テキストを取り出す
    pub fn into_text(self) -> String {
        self.buffer
    }
}

/// テキストを自然な境界で`max_len`バイト以内に切り詰める
///
/// 1. `max_len`以内ならそのまま返す
/// 2. `max_len`が0なら空文字列
/// 3. 直前50バイト以内に文末記号（`.` `!` `?` 改行）があれば、その直後で切る
/// 4. 直前20バイト以内に空白（スペース・タブ・改行）があれば、その手前で切る
/// 5. どちらもなければ`max_len`で切る（マルチバイト文字の途中なら直前の文字境界）
///
/// # 使用例
///
/// ```rust
/// use docparser::truncate_at_boundary;
///
/// assert_eq!(truncate_at_boundary("Hello world. Bye", 14), "Hello world.");
/// assert_eq!(truncate_at_boundary("abcdef", 3), "abc");
/// ```
pub fn truncate_at_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }

    if max_len == 0 {
        return "";
    }

    let bytes = text.as_bytes();

    let search_start = max_len.saturating_sub(SENTENCE_WINDOW);
    for i in (search_start + 1..max_len).rev() {
        if matches!(bytes[i], b'.' | b'!' | b'?' | b'\n') {
            return &text[..=i];
        }
    }

    let search_start = max_len.saturating_sub(WORD_WINDOW);
    for i in (search_start + 1..max_len).rev() {
        if matches!(bytes[i], b' ' | b'\t' | b'\n') {
            return &text[..i];
        }
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_is_plain_concatenation() {
        let mut acc = TextAccumulator::new();
        assert!(acc.append("abc"));
        assert!(acc.append(""));
        assert!(acc.append("def\n"));
        assert_eq!(acc.text(), "abcdef\n");
        assert!(!acc.is_truncated());
        assert!(!acc.should_stop());
        assert_eq!(acc.limit(), None);
    }

    #[test]
    fn test_zero_limit() {
        let mut acc = TextAccumulator::with_limit(0);
        assert!(!acc.append("anything"));
        assert!(acc.is_empty());
        assert!(acc.is_truncated());
        assert!(acc.should_stop());
    }

    #[test]
    fn test_fits_exactly() {
        let mut acc = TextAccumulator::with_limit(5);
        assert!(acc.append("hello"));
        assert!(!acc.is_truncated());
        assert!(acc.should_stop());

        // 上限到達後は何も追加されない
        assert!(!acc.append("x"));
        assert_eq!(acc.text(), "hello");
        assert!(acc.is_truncated());
    }

    #[test]
    fn test_stop_requested_after_refused_append() {
        let mut acc = TextAccumulator::with_limit(5);
        assert!(!acc.stop_requested());
        assert!(acc.append("hello"));

        // 上限ちょうど: テキストのない単位が残っていても切り詰めではない
        assert!(acc.should_stop());
        assert!(!acc.stop_requested());
        assert!(acc.append(""));
        assert!(!acc.is_truncated());

        // テキストを持つ単位が拒否されて初めて打ち切る
        assert!(!acc.append("x"));
        assert!(acc.is_truncated());
        assert!(acc.stop_requested());
        assert!(!acc.append(""));

        let mut unlimited = TextAccumulator::new();
        unlimited.append("hello");
        assert!(!unlimited.stop_requested());
        assert!(!unlimited.is_truncated());
    }

    #[test]
    fn test_empty_append_with_zero_limit() {
        let mut acc = TextAccumulator::with_limit(0);
        assert!(acc.append(""));
        assert!(!acc.is_truncated());
        assert!(!acc.append("a"));
        assert!(acc.is_truncated());
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let mut acc = TextAccumulator::with_limit(14);
        assert!(!acc.append("Hello world. Bye"));
        assert_eq!(acc.text(), "Hello world.");
        assert!(acc.is_truncated());
    }

    #[test]
    fn test_word_boundary_when_no_sentence_end() {
        assert_eq!(truncate_at_boundary("alpha beta gamma", 13), "alpha beta");
    }

    #[test]
    fn test_hard_cut_without_boundary() {
        assert_eq!(truncate_at_boundary("abcdefghij", 4), "abcd");
    }

    #[test]
    fn test_boundary_outside_windows_is_ignored() {
        // 文末記号が50バイトより前にある場合は使わない
        let text = format!("A.{}", "b".repeat(80));
        assert_eq!(truncate_at_boundary(&text, 60), &text[..60]);
    }

    #[test]
    fn test_hard_cut_respects_char_boundary() {
        // "あ"は3バイト
        let text = "あいうえお";
        let cut = truncate_at_boundary(text, 4);
        assert_eq!(cut, "あ");
        assert!(cut.len() <= 4);
    }

    #[test]
    fn test_set_limit_resets_truncated_flag() {
        let mut acc = TextAccumulator::with_limit(1);
        acc.append("abc");
        assert!(acc.is_truncated());
        acc.set_limit(100);
        assert!(!acc.is_truncated());
    }

    #[test]
    fn test_append_char() {
        let mut acc = TextAccumulator::with_limit(4);
        assert!(acc.append_char('é'));
        assert!(acc.append_char('é'));
        assert!(!acc.append_char('é'));
        assert_eq!(acc.text(), "éé");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_never_exceeds_limit(
                limit in 0usize..200,
                pieces in proptest::collection::vec(".{0,40}", 0..20)
            ) {
                let mut acc = TextAccumulator::with_limit(limit);
                for piece in &pieces {
                    acc.append(piece);
                    prop_assert!(acc.len() <= limit);
                }
            }

            #[test]
            fn test_truncation_is_idempotent(
                limit in 1usize..64,
                pieces in proptest::collection::vec("[a-z .!?]{1,30}", 1..20)
            ) {
                let mut acc = TextAccumulator::with_limit(limit);
                let mut refused = false;
                for piece in &pieces {
                    let before = acc.text().to_string();
                    let appended = acc.append(piece);
                    if refused {
                        prop_assert!(!appended);
                        prop_assert_eq!(acc.text(), before.as_str());
                    }
                    if !appended {
                        refused = true;
                        prop_assert!(acc.is_truncated());
                    }
                }
            }

            #[test]
            fn test_truncated_text_is_prefix(text in ".{0,120}", limit in 0usize..130) {
                let cut = truncate_at_boundary(&text, limit);
                prop_assert!(cut.len() <= limit);
                prop_assert!(text.starts_with(cut));
            }
        }
    }
}
