/// Characters that can appear in a C/C++ identifier or destructor name
#[inline]
pub fn is_symbol_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '~'
}

/// Characters that can appear in an operator name
#[inline]
pub fn is_operator_char(ch: char) -> bool {
    matches!(
        ch,
        '!' | '%'
            | '&'
            | '('
            | ')'
            | '+'
            | ','
            | '-'
            | '.'
            | '/'
            | ':'
            | '<'
            | '='
            | '>'
            | '?'
            | '['
            | ']'
            | '^'
            | '|'
            | '~'
    )
}

/// Number of decimal digits in `value`
pub fn digits(mut value: u64) -> usize {
    let mut count = 1;
    while value >= 10 {
        value /= 10;
        count += 1;
    }
    count
}

/// The identifier under 1-based `column` of `line`, if any.
///
/// A cursor just past the end of an identifier still selects it.
pub fn symbol_at(line: &str, column: u32) -> Option<&str> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut idx = (column as usize).checked_sub(1)?;
    if idx >= chars.len() || !is_symbol_char(chars[idx].1) {
        idx = idx.checked_sub(1)?;
        if !chars.get(idx).is_some_and(|&(_, c)| is_symbol_char(c)) {
            return None;
        }
    }

    let mut start = idx;
    while start > 0 && is_symbol_char(chars[start - 1].1) {
        start -= 1;
    }
    let mut end = idx + 1;
    while end < chars.len() && is_symbol_char(chars[end].1) {
        end += 1;
    }

    let from = chars[start].0;
    let mut to = chars.get(end).map_or(line.len(), |&(offset, _)| offset);
    if &line[from..to] == "operator" {
        to += operator_suffix_len(&line[to..]);
    }
    Some(&line[from..to])
}

/// Byte length of the operator token directly after the `operator` keyword
fn operator_suffix_len(rest: &str) -> usize {
    if rest.starts_with("()") {
        return 2;
    }
    rest.chars()
        .take_while(|&ch| is_operator_char(ch) && ch != '(' && ch != ')')
        .map(char::len_utf8)
        .sum()
}
