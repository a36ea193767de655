//! Statement and expression grammar for callable bodies. Bodies are kept
//! as generic nodes; the declaration-level work lives in the parent
//! module. Binary operators are collected into flat expression streams
//! without precedence climbing, which is all body analysis needs.

use crate::ast::{AstNode, NodeKind};
use crate::lexer::token::TokenKind;
use crate::parser::{PResult, Parser};
use crate::tokens::TokenStream;

/// `(int) $x` reads as a parenthesized constant until the following
/// operand proves it was a cast.
fn is_cast_reference(node: &AstNode) -> bool {
    node.kind == NodeKind::ConstantReference
        && matches!(
            node.image.to_lowercase().as_str(),
            "int" | "integer" | "bool" | "boolean" | "float" | "double" | "real" | "string"
                | "object" | "unset" | "binary"
        )
}

fn starts_operand(kind: TokenKind) -> bool {
    kind.starts_name()
        || matches!(
            kind,
            TokenKind::Variable
                | TokenKind::Dollar
                | TokenKind::LNumber
                | TokenKind::DNumber
                | TokenKind::StringLiteral
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::New
                | TokenKind::Clone
                | TokenKind::Array
                | TokenKind::OpenBracket
                | TokenKind::OpenParen
                | TokenKind::Function
                | TokenKind::Static
                | TokenKind::SelfType
                | TokenKind::ParentType
                | TokenKind::Bang
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::BitNot
                | TokenKind::At
                | TokenKind::Inc
                | TokenKind::Dec
                | TokenKind::Ampersand
        )
}

impl<'a, T: TokenStream> Parser<'a, T> {
    /// `{ statement* }` with the node span covering both braces.
    pub(crate) fn parse_scope(&mut self) -> PResult<AstNode> {
        self.capture.push();
        let result = self.parse_scope_inner();
        let tokens = self.capture.pop();
        let mut node = result?;
        node.span = crate::capture::span_of(&tokens);
        Ok(node)
    }

    fn parse_scope_inner(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::OpenBrace)?;
        let mut block = AstNode::new(NodeKind::Block, "");
        loop {
            match self.peek() {
                TokenKind::CloseBrace => {
                    self.next()?;
                    break;
                }
                TokenKind::Eof => return Err(self.token_stream_end()),
                _ => block.add_child(self.parse_statement()?),
            }
        }
        Ok(block)
    }

    pub(crate) fn parse_statement(&mut self) -> PResult<AstNode> {
        self.descend()?;
        self.capture.push();
        let result = self.parse_statement_inner();
        let tokens = self.capture.pop();
        self.ascend();
        let mut node = result?;
        node.span = crate::capture::span_of(&tokens);
        Ok(node)
    }

    fn parse_statement_inner(&mut self) -> PResult<AstNode> {
        match self.peek() {
            TokenKind::OpenBrace => self.parse_scope_inner(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Foreach => self.parse_foreach_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Echo => self.parse_echo_statement(),
            TokenKind::Global => self.parse_global_statement(),
            TokenKind::Unset => self.parse_unset_statement(),
            TokenKind::Break => self.parse_jump_statement(NodeKind::Break, "break"),
            TokenKind::Continue => self.parse_jump_statement(NodeKind::Continue, "continue"),
            TokenKind::Static => self.parse_static_statement(),
            TokenKind::Function => {
                self.parse_function_declaration()?;
                Ok(AstNode::new(NodeKind::ExpressionStatement, ""))
            }
            TokenKind::Abstract
            | TokenKind::Final
            | TokenKind::Readonly
            | TokenKind::Class
            | TokenKind::Interface
            | TokenKind::Trait => {
                // Conditionally declared type inside a body.
                self.parse_type_declaration()?;
                Ok(AstNode::new(NodeKind::ExpressionStatement, ""))
            }
            TokenKind::SemiColon => {
                self.next()?;
                Ok(AstNode::new(NodeKind::ExpressionStatement, ""))
            }
            TokenKind::CloseTag => {
                // Drop back into inline HTML, then pick up at the next
                // open tag.
                self.next()?;
                while matches!(self.peek(), TokenKind::InlineHtml | TokenKind::OpenTag) {
                    self.next()?;
                }
                Ok(AstNode::new(NodeKind::ExpressionStatement, ""))
            }
            TokenKind::Eof => Err(self.token_stream_end()),
            _ => {
                let expr = self.parse_expression()?;
                self.expect_statement_end()?;
                let mut node = AstNode::new(NodeKind::ExpressionStatement, "");
                node.add_child(expr);
                Ok(node)
            }
        }
    }

    fn expect_statement_end(&mut self) -> PResult<()> {
        match self.peek() {
            TokenKind::SemiColon => {
                self.next()?;
                Ok(())
            }
            // `expr ?>` closes the statement implicitly; the close tag is
            // handled by the statement loop.
            TokenKind::CloseTag => Ok(()),
            _ => Err(self.unexpected_here()),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_if_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen)?;

        let mut node = AstNode::new(NodeKind::If, "if");
        node.add_child(condition);
        node.add_child(self.parse_statement()?);

        match self.peek() {
            TokenKind::ElseIf => {
                let mut tail = AstNode::new(NodeKind::Else, "else");
                tail.add_child(self.parse_elseif_statement()?);
                node.add_child(tail);
            }
            TokenKind::Else => {
                self.next()?;
                let mut tail = AstNode::new(NodeKind::Else, "else");
                tail.add_child(self.parse_statement()?);
                node.add_child(tail);
            }
            _ => {}
        }
        Ok(node)
    }

    /// `elseif` unfolds into a nested if inside the else branch.
    fn parse_elseif_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::ElseIf)?;
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen)?;

        let mut node = AstNode::new(NodeKind::If, "elseif");
        node.add_child(condition);
        node.add_child(self.parse_statement()?);

        match self.peek() {
            TokenKind::ElseIf => {
                let mut tail = AstNode::new(NodeKind::Else, "else");
                tail.add_child(self.parse_elseif_statement()?);
                node.add_child(tail);
            }
            TokenKind::Else => {
                self.next()?;
                let mut tail = AstNode::new(NodeKind::Else, "else");
                tail.add_child(self.parse_statement()?);
                node.add_child(tail);
            }
            _ => {}
        }
        Ok(node)
    }

    fn parse_while_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen)?;

        let mut node = AstNode::new(NodeKind::While, "while");
        node.add_child(condition);
        node.add_child(self.parse_statement()?);
        Ok(node)
    }

    fn parse_do_while_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Do)?;
        let body = self.parse_statement()?;
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen)?;
        self.expect_statement_end()?;

        let mut node = AstNode::new(NodeKind::DoWhile, "do");
        node.add_child(body);
        node.add_child(condition);
        Ok(node)
    }

    fn parse_for_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::OpenParen)?;
        let mut node = AstNode::new(NodeKind::For, "for");

        if self.peek() != TokenKind::SemiColon {
            self.parse_expression_list(&mut node)?;
        }
        self.expect(TokenKind::SemiColon)?;
        if self.peek() != TokenKind::SemiColon {
            self.parse_expression_list(&mut node)?;
        }
        self.expect(TokenKind::SemiColon)?;
        if self.peek() != TokenKind::CloseParen {
            self.parse_expression_list(&mut node)?;
        }
        self.expect(TokenKind::CloseParen)?;

        node.add_child(self.parse_statement()?);
        Ok(node)
    }

    fn parse_expression_list(&mut self, into: &mut AstNode) -> PResult<()> {
        loop {
            into.add_child(self.parse_expression()?);
            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_foreach_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Foreach)?;
        self.expect(TokenKind::OpenParen)?;
        let mut node = AstNode::new(NodeKind::Foreach, "foreach");
        node.add_child(self.parse_expression()?);
        self.expect(TokenKind::As)?;
        if self.peek() == TokenKind::Ampersand {
            self.next()?;
        }
        node.add_child(self.parse_expression()?);
        if self.peek() == TokenKind::DoubleArrow {
            self.next()?;
            if self.peek() == TokenKind::Ampersand {
                self.next()?;
            }
            node.add_child(self.parse_expression()?);
        }
        self.expect(TokenKind::CloseParen)?;
        node.add_child(self.parse_statement()?);
        Ok(node)
    }

    fn parse_switch_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Switch)?;
        self.expect(TokenKind::OpenParen)?;
        let subject = self.parse_expression()?;
        self.expect(TokenKind::CloseParen)?;
        self.expect(TokenKind::OpenBrace)?;

        let mut node = AstNode::new(NodeKind::Switch, "switch");
        node.add_child(subject);
        loop {
            match self.peek() {
                TokenKind::CloseBrace => {
                    self.next()?;
                    break;
                }
                TokenKind::Case => {
                    self.next()?;
                    let mut label = AstNode::new(NodeKind::SwitchLabel, "case");
                    label.add_child(self.parse_expression()?);
                    self.parse_switch_label_body(&mut label)?;
                    node.add_child(label);
                }
                TokenKind::Default => {
                    self.next()?;
                    let mut label = AstNode::new(NodeKind::SwitchLabel, "default");
                    self.parse_switch_label_body(&mut label)?;
                    node.add_child(label);
                }
                TokenKind::Eof => return Err(self.token_stream_end()),
                _ => return Err(self.unexpected_here()),
            }
        }
        Ok(node)
    }

    fn parse_switch_label_body(&mut self, label: &mut AstNode) -> PResult<()> {
        match self.peek() {
            TokenKind::Colon | TokenKind::SemiColon => {
                self.next()?;
            }
            _ => return Err(self.unexpected_here()),
        }
        loop {
            match self.peek() {
                TokenKind::Case | TokenKind::Default | TokenKind::CloseBrace => return Ok(()),
                TokenKind::Eof => return Err(self.token_stream_end()),
                _ => label.add_child(self.parse_statement()?),
            }
        }
    }

    fn parse_try_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Try)?;
        let mut node = AstNode::new(NodeKind::Try, "try");
        node.add_child(self.parse_scope()?);

        while self.peek() == TokenKind::Catch {
            node.add_child(self.parse_catch_clause()?);
        }
        if self.peek() == TokenKind::Finally {
            self.next()?;
            let mut fin = AstNode::new(NodeKind::Finally, "finally");
            fin.add_child(self.parse_scope()?);
            node.add_child(fin);
        }
        Ok(node)
    }

    fn parse_catch_clause(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Catch)?;
        self.expect(TokenKind::OpenParen)?;

        let mut node = AstNode::new(NodeKind::Catch, "catch");
        loop {
            let qualified = self.parse_type_name()?;
            self.register_dependency(&qualified);
            node.add_child(AstNode::new(NodeKind::ClassReference, qualified));
            if self.peek() == TokenKind::Pipe {
                self.next()?;
            } else {
                break;
            }
        }
        if self.peek() == TokenKind::Variable {
            let variable = self.next()?;
            let span = variable.source_span();
            node.add_child(AstNode::new(NodeKind::Variable, variable.image).with_span(span));
        }
        self.expect(TokenKind::CloseParen)?;
        node.add_child(self.parse_scope()?);
        Ok(node)
    }

    fn parse_throw_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Throw)?;
        let mut node = AstNode::new(NodeKind::Throw, "throw");
        node.add_child(self.parse_expression()?);
        self.expect_statement_end()?;
        Ok(node)
    }

    fn parse_return_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Return)?;
        let mut node = AstNode::new(NodeKind::Return, "return");
        if !matches!(self.peek(), TokenKind::SemiColon | TokenKind::CloseTag) {
            node.add_child(self.parse_expression()?);
        }
        self.expect_statement_end()?;
        Ok(node)
    }

    fn parse_echo_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Echo)?;
        let mut node = AstNode::new(NodeKind::Echo, "echo");
        self.parse_expression_list(&mut node)?;
        self.expect_statement_end()?;
        Ok(node)
    }

    fn parse_global_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Global)?;
        let mut node = AstNode::new(NodeKind::Global, "global");
        loop {
            let variable = self.expect(TokenKind::Variable)?;
            let span = variable.source_span();
            node.add_child(AstNode::new(NodeKind::Variable, variable.image).with_span(span));
            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }
        self.expect_statement_end()?;
        Ok(node)
    }

    fn parse_unset_statement(&mut self) -> PResult<AstNode> {
        self.expect(TokenKind::Unset)?;
        self.expect(TokenKind::OpenParen)?;
        let mut node = AstNode::new(NodeKind::Unset, "unset");
        self.parse_expression_list(&mut node)?;
        self.expect(TokenKind::CloseParen)?;
        self.expect_statement_end()?;
        Ok(node)
    }

    fn parse_jump_statement(&mut self, kind: NodeKind, image: &str) -> PResult<AstNode> {
        self.next()?;
        let node = AstNode::new(kind, image);
        if self.peek() == TokenKind::LNumber {
            self.next()?;
        }
        self.expect_statement_end()?;
        Ok(node)
    }

    /// `static` followed by `::` or `(` is a static class reference in
    /// expression position; otherwise it opens a static local-variable
    /// declaration.
    fn parse_static_statement(&mut self) -> PResult<AstNode> {
        let static_token = self.next()?;
        match self.peek() {
            TokenKind::DoubleColon | TokenKind::OpenParen => {
                let qualified = self.self_qualified(&static_token, "static")?;
                self.register_dependency(&qualified);
                let reference = AstNode::new(NodeKind::StaticReference, qualified)
                    .with_span(static_token.source_span());
                let chained = self.parse_postfix_chain(reference)?;
                let expr = self.parse_expression_tail(chained)?;
                self.expect_statement_end()?;
                let mut node = AstNode::new(NodeKind::ExpressionStatement, "");
                node.add_child(expr);
                Ok(node)
            }
            TokenKind::Function => {
                self.capture.push();
                self.next()?; // function
                let closure = self.parse_closure_rest()?;
                self.expect_statement_end()?;
                let mut node = AstNode::new(NodeKind::ExpressionStatement, "");
                node.add_child(closure);
                Ok(node)
            }
            TokenKind::Variable => {
                let mut node = AstNode::new(NodeKind::StaticVariableDeclaration, "static");
                loop {
                    let variable = self.expect(TokenKind::Variable)?;
                    let default = if self.peek() == TokenKind::Eq {
                        self.next()?;
                        Some(self.parse_default_value()?)
                    } else {
                        None
                    };
                    self.record_static_variable(variable.image.clone(), default);
                    let span = variable.source_span();
                    node.add_child(
                        AstNode::new(NodeKind::Variable, variable.image).with_span(span),
                    );
                    if self.peek() == TokenKind::Comma {
                        self.next()?;
                    } else {
                        break;
                    }
                }
                self.expect_statement_end()?;
                Ok(node)
            }
            _ => Err(self.unexpected_here()),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub(crate) fn parse_expression(&mut self) -> PResult<AstNode> {
        self.descend()?;
        self.capture.push();
        let result = self
            .parse_operand()
            .and_then(|operand| self.parse_expression_tail(operand));
        let tokens = self.capture.pop();
        self.ascend();
        let mut node = result?;
        node.span = node.span.cover(crate::capture::span_of(&tokens));
        Ok(node)
    }

    /// Continue an already-parsed operand: assignment (decided post-fix),
    /// binary operator streams, `instanceof` and the ternary.
    fn parse_expression_tail(&mut self, first: AstNode) -> PResult<AstNode> {
        if self.peek().is_assign_op() {
            let operator = self.next()?;
            let right = self.parse_expression()?;
            let span = first.span.cover(right.span);
            let mut node = AstNode::new(NodeKind::Assignment, operator.image).with_span(span);
            node.add_child(first);
            node.add_child(right);
            return Ok(node);
        }

        let mut operands = vec![first];
        let mut continued = false;
        loop {
            match self.peek() {
                kind if kind.is_binary_op() => {
                    self.next()?;
                    operands.push(self.parse_operand()?);
                    continued = true;
                }
                TokenKind::InstanceOf => {
                    self.next()?;
                    let class = self.parse_allocation_class_ref()?;
                    let left = operands.pop().unwrap_or_default();
                    let span = left.span.cover(class.span);
                    let mut node =
                        AstNode::new(NodeKind::Instanceof, "instanceof").with_span(span);
                    node.add_child(left);
                    node.add_child(class);
                    operands.push(node);
                    continued = true;
                }
                TokenKind::Question => {
                    self.next()?;
                    let mut node = AstNode::new(NodeKind::Ternary, "?");
                    node.add_child(operands.pop().unwrap_or_default());
                    if self.peek() != TokenKind::Colon {
                        node.add_child(self.parse_expression()?);
                    }
                    self.expect(TokenKind::Colon)?;
                    node.add_child(self.parse_expression()?);
                    operands.push(node);
                    continued = true;
                }
                _ => break,
            }
        }

        if !continued {
            return Ok(operands.pop().unwrap_or_default());
        }
        if operands.len() == 1 {
            return Ok(operands.pop().unwrap_or_default());
        }
        let span = operands
            .iter()
            .fold(crate::span::SourceSpan::default(), |acc, op| {
                acc.cover(op.span)
            });
        let mut node = AstNode::new(NodeKind::Expression, "").with_span(span);
        for operand in operands {
            node.add_child(operand);
        }
        Ok(node)
    }

    fn parse_operand(&mut self) -> PResult<AstNode> {
        self.descend()?;
        let result = self.parse_operand_inner();
        self.ascend();
        result
    }

    fn parse_operand_inner(&mut self) -> PResult<AstNode> {
        match self.peek() {
            TokenKind::Bang
            | TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::BitNot
            | TokenKind::At
            | TokenKind::Inc
            | TokenKind::Dec
            | TokenKind::Ampersand => {
                // Unary operators are consumed into the capture stream
                // only; the operand node stands for the expression.
                self.next()?;
                self.parse_operand()
            }
            TokenKind::New => self.parse_allocation(),
            TokenKind::Clone => {
                let token = self.next()?;
                let mut node =
                    AstNode::new(NodeKind::Clone, "clone").with_span(token.source_span());
                node.add_child(self.parse_operand()?);
                Ok(node)
            }
            TokenKind::Variable => {
                let token = self.next()?;
                let span = token.source_span();
                let node = AstNode::new(NodeKind::Variable, token.image).with_span(span);
                self.parse_postfix_chain(node)
            }
            TokenKind::Dollar => {
                let token = self.next()?;
                let mut node = AstNode::new(NodeKind::VariableVariable, "$")
                    .with_span(token.source_span());
                node.add_child(self.parse_operand()?);
                self.parse_postfix_chain(node)
            }
            TokenKind::LNumber | TokenKind::DNumber | TokenKind::StringLiteral => {
                let token = self.next()?;
                let span = token.source_span();
                Ok(AstNode::new(NodeKind::Literal, token.image).with_span(span))
            }
            TokenKind::True | TokenKind::False | TokenKind::Null => {
                let token = self.next()?;
                let span = token.source_span();
                Ok(AstNode::new(NodeKind::Literal, token.image).with_span(span))
            }
            TokenKind::Array => {
                let token = self.next()?;
                self.expect(TokenKind::OpenParen)?;
                self.consume_balanced(TokenKind::OpenParen, TokenKind::CloseParen)?;
                Ok(AstNode::new(NodeKind::ArrayLiteral, "array")
                    .with_span(token.source_span()))
            }
            TokenKind::OpenBracket => {
                let token = self.next()?;
                self.consume_balanced(TokenKind::OpenBracket, TokenKind::CloseBracket)?;
                Ok(AstNode::new(NodeKind::ArrayLiteral, "[").with_span(token.source_span()))
            }
            TokenKind::OpenParen => {
                self.next()?;
                if self.peek() == TokenKind::Array {
                    let token = self.next()?;
                    if self.peek() == TokenKind::CloseParen {
                        // `(array)` cast.
                        self.next()?;
                        return self.parse_operand();
                    }
                    self.expect(TokenKind::OpenParen)?;
                    self.consume_balanced(TokenKind::OpenParen, TokenKind::CloseParen)?;
                    let literal = AstNode::new(NodeKind::ArrayLiteral, "array")
                        .with_span(token.source_span());
                    let inner = self.parse_expression_tail(literal)?;
                    self.expect(TokenKind::CloseParen)?;
                    return self.parse_postfix_chain(inner);
                }
                let inner = self.parse_operand()?;
                let inner = self.parse_expression_tail(inner)?;
                self.expect(TokenKind::CloseParen)?;
                if is_cast_reference(&inner) && starts_operand(self.peek()) {
                    return self.parse_operand();
                }
                self.parse_postfix_chain(inner)
            }
            TokenKind::Function => {
                self.capture.push();
                self.next()?; // function
                self.parse_closure_rest()
            }
            TokenKind::Static => {
                let token = self.next()?;
                match self.peek() {
                    TokenKind::Function => {
                        self.capture.push();
                        self.next()?;
                        self.parse_closure_rest()
                    }
                    TokenKind::DoubleColon | TokenKind::OpenParen => {
                        let qualified = self.self_qualified(&token, "static")?;
                        self.register_dependency(&qualified);
                        let node = AstNode::new(NodeKind::StaticReference, qualified)
                            .with_span(token.source_span());
                        self.parse_postfix_chain(node)
                    }
                    _ => Err(self.unexpected_here()),
                }
            }
            TokenKind::SelfType => {
                let token = self.next()?;
                let qualified = self.self_qualified(&token, "self")?;
                self.register_dependency(&qualified);
                let node = AstNode::new(NodeKind::SelfReference, qualified)
                    .with_span(token.source_span());
                self.parse_postfix_chain(node)
            }
            TokenKind::ParentType => {
                let token = self.next()?;
                let qualified = self.parent_qualified(&token)?;
                self.register_dependency(&qualified);
                let node = AstNode::new(NodeKind::ParentReference, qualified)
                    .with_span(token.source_span());
                self.parse_postfix_chain(node)
            }
            kind if kind.starts_name() => self.parse_name_operand(),
            _ => Err(self.unexpected_here()),
        }
    }

    /// An operand opening with a qualified name: function call, static
    /// member access or bare constant reference.
    fn parse_name_operand(&mut self) -> PResult<AstNode> {
        let parsed = self.parse_name_raw()?;
        match self.peek() {
            TokenKind::OpenParen => {
                let mut node = AstNode::new(NodeKind::FunctionCall, parsed.raw);
                node.add_child(self.parse_arguments()?);
                self.parse_postfix_chain(node)
            }
            TokenKind::DoubleColon => {
                let qualified = self.resolve_parsed(&parsed);
                self.register_dependency(&qualified);
                self.next()?; // ::
                let class = AstNode::new(NodeKind::ClassReference, qualified);
                let member = self.parse_static_postfix()?;
                let mut node = AstNode::new(NodeKind::MemberPrefix, "::");
                node.span = class.span.cover(member.span);
                node.add_child(class);
                node.add_child(member);
                self.parse_postfix_chain(node)
            }
            _ => {
                // `include`-family keywords read like functions without
                // parentheses.
                let lowered = parsed.raw.to_lowercase();
                if matches!(
                    lowered.as_str(),
                    "include" | "include_once" | "require" | "require_once" | "print"
                ) {
                    let mut node = AstNode::new(NodeKind::FunctionCall, parsed.raw);
                    node.add_child(self.parse_expression()?);
                    return Ok(node);
                }
                Ok(AstNode::new(NodeKind::ConstantReference, parsed.raw))
            }
        }
    }

    fn parse_postfix_chain(&mut self, mut node: AstNode) -> PResult<AstNode> {
        loop {
            match self.peek() {
                TokenKind::Arrow => {
                    self.next()?;
                    let member = self.parse_member_postfix()?;
                    let mut prefix = AstNode::new(NodeKind::MemberPrefix, "->");
                    prefix.span = node.span.cover(member.span);
                    prefix.add_child(node);
                    prefix.add_child(member);
                    node = prefix;
                }
                TokenKind::DoubleColon => {
                    self.next()?;
                    let member = self.parse_static_postfix()?;
                    let mut prefix = AstNode::new(NodeKind::MemberPrefix, "::");
                    prefix.span = node.span.cover(member.span);
                    prefix.add_child(node);
                    prefix.add_child(member);
                    node = prefix;
                }
                TokenKind::OpenBracket => {
                    self.next()?;
                    let mut index = AstNode::new(NodeKind::IndexPostfix, "[");
                    index.span = node.span;
                    index.add_child(node);
                    if self.peek() != TokenKind::CloseBracket {
                        index.add_child(self.parse_expression()?);
                    }
                    self.expect(TokenKind::CloseBracket)?;
                    node = index;
                }
                TokenKind::OpenParen => {
                    let arguments = self.parse_arguments()?;
                    let mut call = AstNode::new(NodeKind::FunctionCall, "");
                    call.span = node.span.cover(arguments.span);
                    call.add_child(node);
                    call.add_child(arguments);
                    node = call;
                }
                TokenKind::Inc | TokenKind::Dec => {
                    self.next()?;
                }
                _ => return Ok(node),
            }
        }
    }

    /// Member access after `->`.
    fn parse_member_postfix(&mut self) -> PResult<AstNode> {
        match self.peek() {
            kind if kind == TokenKind::Identifier || kind.is_keyword() => {
                let token = self.next()?;
                let span = token.source_span();
                if self.peek() == TokenKind::OpenParen {
                    let mut node =
                        AstNode::new(NodeKind::MethodPostfix, token.image).with_span(span);
                    node.add_child(self.parse_arguments()?);
                    Ok(node)
                } else {
                    Ok(AstNode::new(NodeKind::PropertyPostfix, token.image).with_span(span))
                }
            }
            TokenKind::Variable => {
                let token = self.next()?;
                let span = token.source_span();
                if self.peek() == TokenKind::OpenParen {
                    let mut node =
                        AstNode::new(NodeKind::MethodPostfix, token.image).with_span(span);
                    node.add_child(self.parse_arguments()?);
                    Ok(node)
                } else {
                    Ok(AstNode::new(NodeKind::PropertyPostfix, token.image).with_span(span))
                }
            }
            TokenKind::Dollar => {
                let token = self.next()?;
                let mut node = AstNode::new(NodeKind::PropertyPostfix, "$")
                    .with_span(token.source_span());
                node.add_child(self.parse_operand()?);
                Ok(node)
            }
            TokenKind::OpenBrace => {
                // `->{expr}`: dynamic member, consumed without a name.
                let token = self.next()?;
                self.consume_balanced(TokenKind::OpenBrace, TokenKind::CloseBrace)?;
                Ok(AstNode::new(NodeKind::PropertyPostfix, "").with_span(token.source_span()))
            }
            _ => Err(self.unexpected_here()),
        }
    }

    /// Member access after `::`.
    fn parse_static_postfix(&mut self) -> PResult<AstNode> {
        match self.peek() {
            TokenKind::Variable => {
                let token = self.next()?;
                let span = token.source_span();
                if self.peek() == TokenKind::OpenParen {
                    let mut node =
                        AstNode::new(NodeKind::MethodPostfix, token.image).with_span(span);
                    node.add_child(self.parse_arguments()?);
                    Ok(node)
                } else {
                    Ok(AstNode::new(NodeKind::PropertyPostfix, token.image).with_span(span))
                }
            }
            TokenKind::Dollar => {
                let token = self.next()?;
                let mut node = AstNode::new(NodeKind::PropertyPostfix, "$")
                    .with_span(token.source_span());
                node.add_child(self.parse_operand()?);
                Ok(node)
            }
            kind if kind == TokenKind::Identifier || kind.is_keyword() => {
                let token = self.next()?;
                let span = token.source_span();
                if self.peek() == TokenKind::OpenParen {
                    let mut node =
                        AstNode::new(NodeKind::MethodPostfix, token.image).with_span(span);
                    node.add_child(self.parse_arguments()?);
                    Ok(node)
                } else {
                    Ok(AstNode::new(NodeKind::ConstantPostfix, token.image).with_span(span))
                }
            }
            _ => Err(self.unexpected_here()),
        }
    }

    pub(crate) fn parse_arguments(&mut self) -> PResult<AstNode> {
        let open = self.expect(TokenKind::OpenParen)?;
        let mut node = AstNode::new(NodeKind::Arguments, "");
        while self.peek() != TokenKind::CloseParen {
            if self.peek() == TokenKind::Eof {
                return Err(self.token_stream_end());
            }
            if self.peek() == TokenKind::Ampersand {
                self.next()?;
            }
            if self.peek() == TokenKind::Ellipsis {
                self.next()?;
            }
            node.add_child(self.parse_expression()?);
            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }
        let close = self.expect(TokenKind::CloseParen)?;
        node.span = open.source_span().cover(close.source_span());
        Ok(node)
    }

    fn parse_allocation(&mut self) -> PResult<AstNode> {
        let new_token = self.expect(TokenKind::New)?;
        let class = self.parse_allocation_class_ref()?;
        let mut node = AstNode::new(NodeKind::Allocation, "new");
        node.span = new_token.source_span().cover(class.span);
        node.add_child(class);
        if self.peek() == TokenKind::OpenParen {
            let arguments = self.parse_arguments()?;
            node.span = node.span.cover(arguments.span);
            node.add_child(arguments);
        }
        Ok(node)
    }

    /// The class slot of `new` and `instanceof`: one dispatch for named,
    /// `self`/`parent`/`static` and dynamic references.
    pub(crate) fn parse_allocation_class_ref(&mut self) -> PResult<AstNode> {
        match self.peek() {
            TokenKind::SelfType => {
                let token = self.next()?;
                let qualified = self.self_qualified(&token, "self")?;
                self.register_dependency(&qualified);
                Ok(AstNode::new(NodeKind::SelfReference, qualified)
                    .with_span(token.source_span()))
            }
            TokenKind::ParentType => {
                let token = self.next()?;
                let qualified = self.parent_qualified(&token)?;
                self.register_dependency(&qualified);
                Ok(AstNode::new(NodeKind::ParentReference, qualified)
                    .with_span(token.source_span()))
            }
            TokenKind::Static => {
                let token = self.next()?;
                let qualified = self.self_qualified(&token, "static")?;
                self.register_dependency(&qualified);
                Ok(AstNode::new(NodeKind::StaticReference, qualified)
                    .with_span(token.source_span()))
            }
            TokenKind::Variable => {
                let token = self.next()?;
                let span = token.source_span();
                Ok(AstNode::new(NodeKind::Variable, token.image).with_span(span))
            }
            TokenKind::Dollar => {
                let token = self.next()?;
                let mut node = AstNode::new(NodeKind::VariableVariable, "$")
                    .with_span(token.source_span());
                node.add_child(self.parse_operand()?);
                Ok(node)
            }
            kind if kind.starts_name() => {
                let qualified = self.parse_type_name()?;
                self.register_dependency(&qualified);
                Ok(AstNode::new(NodeKind::ClassReference, qualified))
            }
            _ => Err(self.unexpected_here()),
        }
    }

    /// Rest of an anonymous function; the caller has pushed the capture
    /// frame and consumed the `function` keyword.
    pub(crate) fn parse_closure_rest(&mut self) -> PResult<AstNode> {
        if self.peek() == TokenKind::Ampersand {
            self.next()?;
        }
        // Parameter refs register with the registry; the list itself is
        // not modeled for closures.
        let _parameters = self.parse_parameter_list()?;
        if self.peek() == TokenKind::Use {
            self.next()?;
            self.expect(TokenKind::OpenParen)?;
            while self.peek() != TokenKind::CloseParen {
                if self.peek() == TokenKind::Eof {
                    return Err(self.token_stream_end());
                }
                if self.peek() == TokenKind::Ampersand {
                    self.next()?;
                }
                self.expect(TokenKind::Variable)?;
                if self.peek() == TokenKind::Comma {
                    self.next()?;
                } else {
                    break;
                }
            }
            self.expect(TokenKind::CloseParen)?;
        }
        let _return_hint = self.parse_return_hint()?;

        let mut node = AstNode::new(NodeKind::Closure, "function");
        let body = self.parse_scope();
        let tokens = self.capture.pop();
        node.add_child(body?);
        node.span = crate::capture::span_of(&tokens);
        Ok(node)
    }
}
