pub mod token;

use token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq)]
enum LexerState {
    /// Raw output before `<?php` (and after `?>`).
    Initial,
    Scripting,
}

/// Byte-level scanner producing line/column-annotated tokens with owned
/// images. String interiors are opaque: no encapsed-variable sub-lexing.
pub struct Lexer<'src> {
    input: &'src [u8],
    cursor: usize,
    line: u32,
    col: u32,
    // Position of the most recently consumed byte.
    last_line: u32,
    last_col: u32,
    state: LexerState,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src [u8]) -> Self {
        Self {
            input,
            cursor: 0,
            line: 1,
            col: 1,
            last_line: 1,
            last_col: 1,
            state: LexerState::Initial,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.cursor).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.input.get(self.cursor + n).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.last_line = self.line;
            self.last_col = self.col;
            if c == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.cursor += 1;
        }
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.input[self.cursor..].starts_with(prefix)
    }

    fn starts_with_ci(&self, prefix: &[u8]) -> bool {
        let rest = &self.input[self.cursor..];
        rest.len() >= prefix.len()
            && rest[..prefix.len()].eq_ignore_ascii_case(prefix)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn make_token(
        &self,
        kind: TokenKind,
        start: usize,
        start_line: u32,
        start_col: u32,
    ) -> Token {
        Token {
            kind,
            image: String::from_utf8_lossy(&self.input[start..self.cursor]).into_owned(),
            start_line,
            start_col,
            end_line: self.last_line,
            end_col: self.last_col,
        }
    }

    fn eof_token(&self) -> Token {
        Token {
            kind: TokenKind::Eof,
            image: String::new(),
            start_line: self.line,
            start_col: self.col,
            end_line: self.line,
            end_col: self.col,
        }
    }

    pub fn next_token(&mut self) -> Token {
        match self.state {
            LexerState::Initial => self.next_initial(),
            LexerState::Scripting => self.next_scripting(),
        }
    }

    fn next_initial(&mut self) -> Token {
        if self.peek().is_none() {
            return self.eof_token();
        }

        let start = self.cursor;
        let (start_line, start_col) = (self.line, self.col);

        if self.starts_with_ci(b"<?php") {
            self.advance_n(5);
            self.state = LexerState::Scripting;
            return self.make_token(TokenKind::OpenTag, start, start_line, start_col);
        }
        if self.starts_with(b"<?") {
            self.advance_n(2);
            self.state = LexerState::Scripting;
            return self.make_token(TokenKind::OpenTag, start, start_line, start_col);
        }

        // Raw output until the next open tag.
        while self.peek().is_some() && !self.starts_with_ci(b"<?php") && !self.starts_with(b"<?") {
            self.advance();
        }
        self.make_token(TokenKind::InlineHtml, start, start_line, start_col)
    }

    fn next_scripting(&mut self) -> Token {
        self.skip_whitespace();

        let c = match self.peek() {
            Some(c) => c,
            None => return self.eof_token(),
        };

        let start = self.cursor;
        let (start_line, start_col) = (self.line, self.col);

        let kind = match c {
            b'$' => {
                self.advance();
                if self
                    .peek()
                    .map(|c| c.is_ascii_alphabetic() || c == b'_' || c >= 0x80)
                    .unwrap_or(false)
                {
                    self.read_identifier();
                    TokenKind::Variable
                } else {
                    TokenKind::Dollar
                }
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 => {
                self.read_identifier();
                keyword_kind(&self.input[start..self.cursor])
            }
            c if c.is_ascii_digit() => self.read_number(),
            b'.' if self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false) => {
                self.read_number()
            }
            b'\'' => self.read_single_quoted(),
            b'"' => self.read_double_quoted(),
            b'#' => self.read_line_comment(),
            b'/' => {
                if self.peek_at(1) == Some(b'/') {
                    self.read_line_comment()
                } else if self.peek_at(1) == Some(b'*') {
                    self.read_block_comment()
                } else if self.peek_at(1) == Some(b'=') {
                    self.advance_n(2);
                    TokenKind::DivEq
                } else {
                    self.advance();
                    TokenKind::Slash
                }
            }
            b'?' => {
                if self.peek_at(1) == Some(b'>') {
                    self.advance_n(2);
                    self.state = LexerState::Initial;
                    TokenKind::CloseTag
                } else if self.peek_at(1) == Some(b'?') {
                    if self.peek_at(2) == Some(b'=') {
                        self.advance_n(3);
                        TokenKind::CoalesceEq
                    } else {
                        self.advance_n(2);
                        TokenKind::Coalesce
                    }
                } else {
                    self.advance();
                    TokenKind::Question
                }
            }
            b'<' => {
                if self.starts_with(b"<=>") {
                    self.advance_n(3);
                    TokenKind::Spaceship
                } else if self.starts_with(b"<<<") {
                    self.read_heredoc()
                } else if self.starts_with(b"<<=") {
                    self.advance_n(3);
                    TokenKind::SlEq
                } else if self.starts_with(b"<<") {
                    self.advance_n(2);
                    TokenKind::Sl
                } else if self.starts_with(b"<=") {
                    self.advance_n(2);
                    TokenKind::LtEq
                } else if self.starts_with(b"<>") {
                    self.advance_n(2);
                    TokenKind::BangEq
                } else {
                    self.advance();
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.starts_with(b">>=") {
                    self.advance_n(3);
                    TokenKind::SrEq
                } else if self.starts_with(b">>") {
                    self.advance_n(2);
                    TokenKind::Sr
                } else if self.starts_with(b">=") {
                    self.advance_n(2);
                    TokenKind::GtEq
                } else {
                    self.advance();
                    TokenKind::Gt
                }
            }
            b'=' => {
                if self.starts_with(b"===") {
                    self.advance_n(3);
                    TokenKind::EqEqEq
                } else if self.starts_with(b"==") {
                    self.advance_n(2);
                    TokenKind::EqEq
                } else if self.starts_with(b"=>") {
                    self.advance_n(2);
                    TokenKind::DoubleArrow
                } else {
                    self.advance();
                    TokenKind::Eq
                }
            }
            b'!' => {
                if self.starts_with(b"!==") {
                    self.advance_n(3);
                    TokenKind::BangEqEq
                } else if self.starts_with(b"!=") {
                    self.advance_n(2);
                    TokenKind::BangEq
                } else {
                    self.advance();
                    TokenKind::Bang
                }
            }
            b'+' => {
                if self.starts_with(b"++") {
                    self.advance_n(2);
                    TokenKind::Inc
                } else if self.starts_with(b"+=") {
                    self.advance_n(2);
                    TokenKind::PlusEq
                } else {
                    self.advance();
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.starts_with(b"--") {
                    self.advance_n(2);
                    TokenKind::Dec
                } else if self.starts_with(b"-=") {
                    self.advance_n(2);
                    TokenKind::MinusEq
                } else if self.starts_with(b"->") {
                    self.advance_n(2);
                    TokenKind::Arrow
                } else {
                    self.advance();
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.starts_with(b"**=") {
                    self.advance_n(3);
                    TokenKind::PowEq
                } else if self.starts_with(b"**") {
                    self.advance_n(2);
                    TokenKind::Pow
                } else if self.starts_with(b"*=") {
                    self.advance_n(2);
                    TokenKind::MulEq
                } else {
                    self.advance();
                    TokenKind::Asterisk
                }
            }
            b'%' => {
                if self.starts_with(b"%=") {
                    self.advance_n(2);
                    TokenKind::ModEq
                } else {
                    self.advance();
                    TokenKind::Percent
                }
            }
            b'.' => {
                if self.starts_with(b"...") {
                    self.advance_n(3);
                    TokenKind::Ellipsis
                } else if self.starts_with(b".=") {
                    self.advance_n(2);
                    TokenKind::ConcatEq
                } else {
                    self.advance();
                    TokenKind::Dot
                }
            }
            b'&' => {
                if self.starts_with(b"&&") {
                    self.advance_n(2);
                    TokenKind::AmpAmp
                } else if self.starts_with(b"&=") {
                    self.advance_n(2);
                    TokenKind::AndEq
                } else {
                    self.advance();
                    TokenKind::Ampersand
                }
            }
            b'|' => {
                if self.starts_with(b"||") {
                    self.advance_n(2);
                    TokenKind::PipePipe
                } else if self.starts_with(b"|=") {
                    self.advance_n(2);
                    TokenKind::OrEq
                } else {
                    self.advance();
                    TokenKind::Pipe
                }
            }
            b'^' => {
                if self.starts_with(b"^=") {
                    self.advance_n(2);
                    TokenKind::XorEq
                } else {
                    self.advance();
                    TokenKind::Caret
                }
            }
            b':' => {
                if self.starts_with(b"::") {
                    self.advance_n(2);
                    TokenKind::DoubleColon
                } else {
                    self.advance();
                    TokenKind::Colon
                }
            }
            b'~' => {
                self.advance();
                TokenKind::BitNot
            }
            b'@' => {
                self.advance();
                TokenKind::At
            }
            b';' => {
                self.advance();
                TokenKind::SemiColon
            }
            b',' => {
                self.advance();
                TokenKind::Comma
            }
            b'{' => {
                self.advance();
                TokenKind::OpenBrace
            }
            b'}' => {
                self.advance();
                TokenKind::CloseBrace
            }
            b'(' => {
                self.advance();
                TokenKind::OpenParen
            }
            b')' => {
                self.advance();
                TokenKind::CloseParen
            }
            b'[' => {
                self.advance();
                TokenKind::OpenBracket
            }
            b']' => {
                self.advance();
                TokenKind::CloseBracket
            }
            b'\\' => {
                self.advance();
                TokenKind::NsSeparator
            }
            _ => {
                self.advance();
                TokenKind::Error
            }
        };

        self.make_token(kind, start, start_line, start_col)
    }

    fn read_identifier(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80 {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let mut is_float = false;

        // Hex / binary / octal prefixes.
        if self.peek() == Some(b'0') {
            match self.peek_at(1) {
                Some(b'x') | Some(b'X') => {
                    self.advance_n(2);
                    while let Some(c) = self.peek() {
                        if c.is_ascii_hexdigit() || c == b'_' {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    return TokenKind::LNumber;
                }
                Some(b'b') | Some(b'B') => {
                    self.advance_n(2);
                    while matches!(self.peek(), Some(b'0') | Some(b'1') | Some(b'_')) {
                        self.advance();
                    }
                    return TokenKind::LNumber;
                }
                _ => {}
            }
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'_' {
                self.advance();
            } else if c == b'.' {
                if is_float || !self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    break;
                }
                is_float = true;
                self.advance();
            } else if c == b'e' || c == b'E' {
                if !self
                    .peek_at(1)
                    .map(|c| c.is_ascii_digit() || c == b'+' || c == b'-')
                    .unwrap_or(false)
                {
                    break;
                }
                is_float = true;
                self.advance();
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.advance();
                }
            } else {
                break;
            }
        }

        if is_float {
            TokenKind::DNumber
        } else {
            TokenKind::LNumber
        }
    }

    fn read_single_quoted(&mut self) -> TokenKind {
        self.advance(); // opening quote
        while let Some(c) = self.peek() {
            if c == b'\\' {
                self.advance();
                self.advance();
            } else if c == b'\'' {
                self.advance();
                break;
            } else {
                self.advance();
            }
        }
        TokenKind::StringLiteral
    }

    fn read_double_quoted(&mut self) -> TokenKind {
        self.advance(); // opening quote
        while let Some(c) = self.peek() {
            if c == b'\\' {
                self.advance();
                self.advance();
            } else if c == b'"' {
                self.advance();
                break;
            } else {
                self.advance();
            }
        }
        TokenKind::StringLiteral
    }

    /// Heredoc / nowdoc bodies collapse into a single string token spanning
    /// `<<<LABEL` through the closing label. The interior is an opaque image,
    /// like every other string form here.
    fn read_heredoc(&mut self) -> TokenKind {
        self.advance_n(3); // <<<
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.advance();
        }
        let quote = match self.peek() {
            Some(q @ b'\'') | Some(q @ b'"') => {
                self.advance();
                Some(q)
            }
            _ => None,
        };
        let label_start = self.cursor;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80 {
                self.advance();
            } else {
                break;
            }
        }
        let label = self.input[label_start..self.cursor].to_vec();
        if let Some(q) = quote {
            if self.peek() == Some(q) {
                self.advance();
            }
        }
        // Rest of the opener line.
        while let Some(c) = self.peek() {
            let done = c == b'\n';
            self.advance();
            if done {
                break;
            }
        }
        if label.is_empty() {
            return TokenKind::StringLiteral;
        }
        loop {
            // Cursor sits at the start of a body line; the terminator may be
            // indented.
            let mut probe = self.cursor;
            while matches!(self.input.get(probe), Some(b' ') | Some(b'\t')) {
                probe += 1;
            }
            if self.input[probe..].starts_with(&label) {
                let after = self.input.get(probe + label.len()).copied();
                let part_of_identifier =
                    matches!(after, Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80);
                if !part_of_identifier {
                    while self.cursor < probe + label.len() {
                        self.advance();
                    }
                    return TokenKind::StringLiteral;
                }
            }
            loop {
                match self.peek() {
                    None => return TokenKind::StringLiteral,
                    Some(b'\n') => {
                        self.advance();
                        break;
                    }
                    _ => {
                        self.advance();
                    }
                }
            }
        }
    }

    fn read_line_comment(&mut self) -> TokenKind {
        while let Some(c) = self.peek() {
            if c == b'\n' || c == b'\r' {
                break;
            }
            if c == b'?' && self.peek_at(1) == Some(b'>') {
                break;
            }
            self.advance();
        }
        TokenKind::Comment
    }

    fn read_block_comment(&mut self) -> TokenKind {
        let is_doc = self.starts_with(b"/**") && self.peek_at(3) != Some(b'/');
        self.advance_n(2);
        while self.peek().is_some() {
            if self.starts_with(b"*/") {
                self.advance_n(2);
                break;
            }
            self.advance();
        }
        if is_doc {
            TokenKind::DocComment
        } else {
            TokenKind::Comment
        }
    }
}

/// PHP keywords are case-insensitive.
fn keyword_kind(image: &[u8]) -> TokenKind {
    let lower = image.to_ascii_lowercase();
    match lower.as_slice() {
        b"class" => TokenKind::Class,
        b"interface" => TokenKind::Interface,
        b"trait" => TokenKind::Trait,
        b"function" => TokenKind::Function,
        b"namespace" => TokenKind::Namespace,
        b"use" => TokenKind::Use,
        b"as" => TokenKind::As,
        b"extends" => TokenKind::Extends,
        b"implements" => TokenKind::Implements,
        b"public" => TokenKind::Public,
        b"protected" => TokenKind::Protected,
        b"private" => TokenKind::Private,
        b"static" => TokenKind::Static,
        b"abstract" => TokenKind::Abstract,
        b"final" => TokenKind::Final,
        b"readonly" => TokenKind::Readonly,
        b"var" => TokenKind::Var,
        b"const" => TokenKind::Const,
        b"global" => TokenKind::Global,
        b"new" => TokenKind::New,
        b"clone" => TokenKind::Clone,
        b"instanceof" => TokenKind::InstanceOf,
        b"self" => TokenKind::SelfType,
        b"parent" => TokenKind::ParentType,
        b"if" => TokenKind::If,
        b"else" => TokenKind::Else,
        b"elseif" => TokenKind::ElseIf,
        b"while" => TokenKind::While,
        b"do" => TokenKind::Do,
        b"for" => TokenKind::For,
        b"foreach" => TokenKind::Foreach,
        b"switch" => TokenKind::Switch,
        b"case" => TokenKind::Case,
        b"default" => TokenKind::Default,
        b"break" => TokenKind::Break,
        b"continue" => TokenKind::Continue,
        b"return" => TokenKind::Return,
        b"try" => TokenKind::Try,
        b"catch" => TokenKind::Catch,
        b"finally" => TokenKind::Finally,
        b"throw" => TokenKind::Throw,
        b"echo" => TokenKind::Echo,
        b"unset" => TokenKind::Unset,
        b"true" => TokenKind::True,
        b"false" => TokenKind::False,
        b"null" => TokenKind::Null,
        b"array" => TokenKind::Array,
        b"and" => TokenKind::LogicalAnd,
        b"or" => TokenKind::LogicalOr,
        b"xor" => TokenKind::LogicalXor,
        _ => TokenKind::Identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source.as_bytes());
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn scans_open_tag_and_class_header() {
        assert_eq!(
            kinds("<?php final class Foo {}"),
            vec![
                TokenKind::OpenTag,
                TokenKind::Final,
                TokenKind::Class,
                TokenKind::Identifier,
                TokenKind::OpenBrace,
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("<?php CLASS Foo EXTENDS Bar {}")[1],
            TokenKind::Class
        );
    }

    #[test]
    fn variable_variable_is_dollar_then_variable() {
        assert_eq!(
            kinds("<?php $$name;"),
            vec![
                TokenKind::OpenTag,
                TokenKind::Dollar,
                TokenKind::Variable,
                TokenKind::SemiColon,
            ]
        );
    }

    #[test]
    fn positions_are_one_based_and_inclusive() {
        let mut lexer = Lexer::new(b"<?php\n$abc = 1;" as &[u8]);
        let open = lexer.next_token();
        assert_eq!((open.start_line, open.start_col), (1, 1));
        assert_eq!((open.end_line, open.end_col), (1, 5));

        let var = lexer.next_token();
        assert_eq!(var.kind, TokenKind::Variable);
        assert_eq!(var.image, "$abc");
        assert_eq!((var.start_line, var.start_col), (2, 1));
        assert_eq!((var.end_line, var.end_col), (2, 4));
    }

    #[test]
    fn doc_comment_is_distinguished_from_plain_comment() {
        let ks = kinds("<?php /** doc */ /* plain */ // line\n$a;");
        assert_eq!(
            ks,
            vec![
                TokenKind::OpenTag,
                TokenKind::DocComment,
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::Variable,
                TokenKind::SemiColon,
            ]
        );
    }

    #[test]
    fn string_images_are_verbatim() {
        let mut lexer = Lexer::new(b"<?php 'it\\'s' \"a\\\"b\";" as &[u8]);
        lexer.next_token();
        assert_eq!(lexer.next_token().image, "'it\\'s'");
        assert_eq!(lexer.next_token().image, "\"a\\\"b\"");
    }

    #[test]
    fn inline_html_before_open_tag() {
        let ks = kinds("<html><?php echo 1;");
        assert_eq!(ks[0], TokenKind::InlineHtml);
        assert_eq!(ks[1], TokenKind::OpenTag);
    }

    #[test]
    fn heredoc_is_one_string_literal() {
        let source = "<?php $msg = <<<EOT\nfirst line\nsecond line\nEOT;\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::OpenTag,
                TokenKind::Variable,
                TokenKind::Eq,
                TokenKind::StringLiteral,
                TokenKind::SemiColon,
            ]
        );

        let mut lexer = Lexer::new(source.as_bytes());
        lexer.next_token();
        lexer.next_token();
        lexer.next_token();
        let literal = lexer.next_token();
        assert_eq!(literal.image, "<<<EOT\nfirst line\nsecond line\nEOT");
        assert_eq!((literal.start_line, literal.end_line), (1, 4));
    }

    #[test]
    fn nowdoc_label_and_indented_terminator() {
        let source = "<?php $a = <<<'RAW'\nno $interp here\n    RAW;\n$b = 2;";
        let ks = kinds(source);
        assert_eq!(
            ks,
            vec![
                TokenKind::OpenTag,
                TokenKind::Variable,
                TokenKind::Eq,
                TokenKind::StringLiteral,
                TokenKind::SemiColon,
                TokenKind::Variable,
                TokenKind::Eq,
                TokenKind::LNumber,
                TokenKind::SemiColon,
            ]
        );
    }

    #[test]
    fn heredoc_skips_label_lookalikes_inside_the_body() {
        // EOTX shares the prefix but is not a terminator.
        let source = "<?php $a = <<<EOT\nEOTX\nEOT;\n";
        let ks = kinds(source);
        assert_eq!(ks[3], TokenKind::StringLiteral);
        assert_eq!(ks[4], TokenKind::SemiColon);
    }
}
