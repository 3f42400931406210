pub trait NormalizeString {
    /// Converts `\r\n` and lone `\r` to `\n` and guarantees a trailing `\n`.
    fn normalize(&self) -> String;
}

impl NormalizeString for str {
    fn normalize(&self) -> String {
        let mut out = String::with_capacity(self.len() + 1);
        let mut chars = self.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == '\r' {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            } else {
                out.push(ch);
            }
        }

        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

impl NormalizeString for String {
    fn normalize(&self) -> String {
        self.as_str().normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_becomes_single_newline() {
        assert_eq!("".normalize(), "\n");
    }

    #[test]
    fn adds_trailing_newline_when_missing() {
        assert_eq!("a\nb".normalize(), "a\nb\n");
        assert_eq!("hello\n".normalize(), "hello\n");
    }

    #[test]
    fn line_endings_converted() {
        assert_eq!("a\r\nb\rc\n".normalize(), "a\nb\nc\n");
        assert_eq!("a\r\r\nb".normalize(), "a\n\nb\n");
    }

    #[test]
    fn unicode_preserved() {
        assert_eq!("héllo\r\nwörld".normalize(), "héllo\nwörld\n");
    }
}
