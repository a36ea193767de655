mod expr;

use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::builder::Builder;
use crate::capture::{span_of, CaptureStack};
use crate::doc;
use crate::engine::Config;
use crate::error::ParseError;
use crate::lexer::token::{Token, TokenKind};
use crate::model::{
    join_qualified, Callable, Constant, DefaultValue, FunctionDecl, Modifiers, Parameter,
    Property, TypeDecl, TypeId, TypeKind, TypeRef, DEFAULT_NAMESPACE,
};
use crate::symbols::SymbolTable;
use crate::tokens::TokenStream;

pub(crate) type PResult<T> = Result<T, ParseError>;

/// The enclosing type while its body is being parsed; needed to resolve
/// `self`, `parent` and `static`.
struct ClassCtx {
    qualified_name: String,
    parent: Option<String>,
}

/// A raw qualified name as written, before resolution. `relative` marks the
/// `namespace\Foo` form, which is prefixed with the current namespace
/// verbatim and bypasses alias lookup.
struct ParsedName {
    raw: String,
    relative: bool,
}

/// Recursive-descent parser over one file's token stream. Declarations are
/// assembled locally and committed to the registry only when their closing
/// brace has been consumed, so a fatal error never exposes a partial type
/// as complete.
pub struct Parser<'a, T: TokenStream> {
    stream: T,
    builder: &'a mut Builder,
    symbols: &'a mut SymbolTable,
    config: &'a Config,
    file: String,
    capture: CaptureStack,
    pending_doc: Option<String>,
    /// Legacy `@package` from the file comment; only consulted while no
    /// native namespace exists in the file.
    package: Option<String>,
    has_namespace: bool,
    namespace: Option<String>,
    class_ctx: Option<ClassCtx>,
    depth: usize,
    /// Per-callable collection frames, innermost last.
    deps: Vec<Vec<Rc<TypeRef>>>,
    statics: Vec<IndexMap<String, Option<DefaultValue>>>,
}

impl<'a, T: TokenStream> Parser<'a, T> {
    pub fn new(
        stream: T,
        builder: &'a mut Builder,
        symbols: &'a mut SymbolTable,
        config: &'a Config,
        file: &str,
    ) -> Self {
        Self {
            stream,
            builder,
            symbols,
            config,
            file: file.to_string(),
            capture: CaptureStack::new(),
            pending_doc: None,
            package: None,
            has_namespace: false,
            namespace: None,
            class_ctx: None,
            depth: 0,
            deps: Vec::new(),
            statics: Vec::new(),
        }
    }

    pub fn parse(mut self) -> PResult<()> {
        debug!("parsing {}", self.file);
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                _ => self.parse_top_level_item()?,
            }
        }
        Ok(())
    }

    fn parse_top_level_item(&mut self) -> PResult<()> {
        match self.peek() {
            TokenKind::OpenTag | TokenKind::CloseTag | TokenKind::InlineHtml => {
                self.next()?;
            }
            TokenKind::SemiColon => {
                self.next()?;
            }
            TokenKind::Namespace => self.parse_namespace_statement()?,
            TokenKind::Use => self.parse_use_statement()?,
            TokenKind::Abstract
            | TokenKind::Final
            | TokenKind::Readonly
            | TokenKind::Class
            | TokenKind::Interface
            | TokenKind::Trait => {
                self.parse_type_declaration()?;
            }
            TokenKind::Function => self.parse_function_declaration()?,
            TokenKind::Const => self.parse_file_constant()?,
            _ => {
                self.parse_statement()?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Token plumbing. `peek` skims comments into all open capture frames;
    // a doc comment becomes the pending doc comment for the next
    // declaration, and the first one right after the open tag additionally
    // feeds the legacy package annotation.
    // ------------------------------------------------------------------

    pub(crate) fn peek(&mut self) -> TokenKind {
        loop {
            match self.stream.peek() {
                TokenKind::Comment => {
                    let token = self.stream.next();
                    self.capture.record(&token);
                }
                TokenKind::DocComment => {
                    let prev = self.stream.prev();
                    let token = self.stream.next();
                    self.capture.record(&token);
                    if prev == TokenKind::OpenTag
                        && !self.config.ignore_annotations
                        && self.package.is_none()
                    {
                        self.package = doc::package(&token.image);
                    }
                    self.pending_doc = Some(token.image);
                }
                kind => return kind,
            }
        }
    }

    pub(crate) fn next(&mut self) -> PResult<Token> {
        if self.peek() == TokenKind::Eof {
            return Err(ParseError::TokenStreamEnd {
                file: self.file.clone(),
            });
        }
        let token = self.stream.next();
        self.capture.record(&token);
        Ok(token)
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.peek() == kind {
            self.next()
        } else {
            Err(self.unexpected_here())
        }
    }

    pub(crate) fn unexpected(&self, token: &Token) -> ParseError {
        ParseError::UnexpectedToken {
            image: token.image.clone(),
            line: token.start_line,
            col: token.start_col,
            file: self.file.clone(),
        }
    }

    pub(crate) fn unexpected_here(&mut self) -> ParseError {
        if self.peek() == TokenKind::Eof {
            return ParseError::TokenStreamEnd {
                file: self.file.clone(),
            };
        }
        match self.next() {
            Ok(token) => self.unexpected(&token),
            Err(err) => err,
        }
    }

    pub(crate) fn token_stream_end(&self) -> ParseError {
        ParseError::TokenStreamEnd {
            file: self.file.clone(),
        }
    }

    pub(crate) fn descend(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > self.config.max_nesting {
            return Err(ParseError::invalid_state(format!(
                "Maximum nesting level of {} reached, file: {}",
                self.config.max_nesting, self.file
            )));
        }
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth -= 1;
    }

    // ------------------------------------------------------------------
    // Qualified names
    // ------------------------------------------------------------------

    fn parse_name_raw(&mut self) -> PResult<ParsedName> {
        match self.peek() {
            TokenKind::NsSeparator => {
                self.next()?;
                let mut raw = String::from("\\");
                raw.push_str(&self.expect(TokenKind::Identifier)?.image);
                self.parse_name_tail(&mut raw)?;
                Ok(ParsedName {
                    raw,
                    relative: false,
                })
            }
            TokenKind::Namespace => {
                self.next()?;
                self.expect(TokenKind::NsSeparator)?;
                let mut raw = self.expect(TokenKind::Identifier)?.image;
                self.parse_name_tail(&mut raw)?;
                Ok(ParsedName {
                    raw,
                    relative: true,
                })
            }
            TokenKind::Identifier => {
                let mut raw = self.next()?.image;
                self.parse_name_tail(&mut raw)?;
                Ok(ParsedName {
                    raw,
                    relative: false,
                })
            }
            _ => Err(self.unexpected_here()),
        }
    }

    fn parse_name_tail(&mut self, raw: &mut String) -> PResult<()> {
        while self.peek() == TokenKind::NsSeparator {
            self.next()?;
            raw.push('\\');
            raw.push_str(&self.expect(TokenKind::Identifier)?.image);
        }
        Ok(())
    }

    fn resolve_parsed(&self, name: &ParsedName) -> String {
        if name.relative {
            return match &self.namespace {
                Some(ns) => format!("{}\\{}", ns, name.raw),
                None => name.raw.clone(),
            };
        }
        self.resolve_name(&name.raw)
    }

    /// The qualified-name resolution algorithm, used everywhere a type
    /// name is parsed: leading separator means already fully qualified;
    /// otherwise the first segment goes through the import alias table;
    /// otherwise an open namespace prefixes the whole name; otherwise the
    /// name falls back to the global namespace or, in files without any
    /// native namespace, the legacy doc-comment package.
    pub(crate) fn resolve_name(&self, raw: &str) -> String {
        if let Some(stripped) = raw.strip_prefix('\\') {
            return stripped.to_string();
        }
        let (first, rest) = match raw.find('\\') {
            Some(pos) => (&raw[..pos], &raw[pos + 1..]),
            None => (raw, ""),
        };
        if let Some(mapped) = self.symbols.lookup(first) {
            return if rest.is_empty() {
                mapped.to_string()
            } else {
                format!("{}\\{}", mapped, rest)
            };
        }
        if let Some(ns) = &self.namespace {
            return format!("{}\\{}", ns, raw);
        }
        if !self.has_namespace {
            if let Some(package) = &self.package {
                return join_qualified(package, raw);
            }
        }
        raw.to_string()
    }

    /// Parse a type name and resolve it to a canonical qualified name.
    pub(crate) fn parse_type_name(&mut self) -> PResult<String> {
        let parsed = self.parse_name_raw()?;
        Ok(self.resolve_parsed(&parsed))
    }

    fn declaration_namespace(&self, doc_comment: Option<&str>) -> String {
        if let Some(ns) = &self.namespace {
            return ns.clone();
        }
        if !self.has_namespace && !self.config.ignore_annotations {
            if let Some(comment) = doc_comment {
                if let Some(package) = doc::package(comment) {
                    return package;
                }
            }
            if let Some(package) = &self.package {
                return package.clone();
            }
        }
        DEFAULT_NAMESPACE.to_string()
    }

    // ------------------------------------------------------------------
    // self / parent / static resolution
    // ------------------------------------------------------------------

    pub(crate) fn self_qualified(&self, token: &Token, keyword: &str) -> PResult<String> {
        match &self.class_ctx {
            Some(ctx) => Ok(ctx.qualified_name.clone()),
            None => Err(ParseError::invalid_state(format!(
                "The keyword '{}' was used outside of a class scope, line: {}, col: {}, file: {}",
                keyword, token.start_line, token.start_col, self.file
            ))),
        }
    }

    pub(crate) fn parent_qualified(&self, token: &Token) -> PResult<String> {
        let ctx = match &self.class_ctx {
            Some(ctx) => ctx,
            None => {
                return Err(ParseError::invalid_state(format!(
                    "The keyword 'parent' was used outside of a class scope, line: {}, col: {}, file: {}",
                    token.start_line, token.start_col, self.file
                )))
            }
        };
        match &ctx.parent {
            Some(parent) => Ok(parent.clone()),
            None => Err(ParseError::invalid_state(format!(
                "The keyword 'parent' was used but class '{}' does not declare a parent, line: {}, col: {}, file: {}",
                ctx.qualified_name, token.start_line, token.start_col, self.file
            ))),
        }
    }

    fn self_type_ref(&mut self, token: &Token, keyword: &str) -> PResult<Rc<TypeRef>> {
        let qualified = self.self_qualified(token, keyword)?;
        Ok(self.builder.build_type_ref(&qualified))
    }

    fn parent_type_ref(&mut self, token: &Token) -> PResult<Rc<TypeRef>> {
        let qualified = self.parent_qualified(token)?;
        Ok(self.builder.build_type_ref(&qualified))
    }

    /// Record a body-level type dependency of the innermost callable.
    pub(crate) fn register_dependency(&mut self, qualified_name: &str) -> Rc<TypeRef> {
        let reference = self.builder.build_type_ref(qualified_name);
        if let Some(frame) = self.deps.last_mut() {
            frame.push(Rc::clone(&reference));
        }
        reference
    }

    pub(crate) fn record_static_variable(&mut self, name: String, value: Option<DefaultValue>) {
        if let Some(frame) = self.statics.last_mut() {
            frame.insert(name, value);
        }
    }

    // ------------------------------------------------------------------
    // namespace / use / const at file level
    // ------------------------------------------------------------------

    fn parse_namespace_statement(&mut self) -> PResult<()> {
        self.next()?; // namespace
        match self.peek() {
            TokenKind::Identifier => {
                let mut name = self.next()?.image;
                self.parse_name_tail(&mut name)?;
                self.has_namespace = true;
                if self.peek() == TokenKind::OpenBrace {
                    let saved = self.namespace.replace(name);
                    self.parse_namespace_block()?;
                    self.namespace = saved;
                } else {
                    self.expect(TokenKind::SemiColon)?;
                    self.namespace = Some(name);
                }
            }
            TokenKind::OpenBrace => {
                // `namespace { ... }`: explicit global namespace block.
                self.has_namespace = true;
                let saved = self.namespace.take();
                self.parse_namespace_block()?;
                self.namespace = saved;
            }
            TokenKind::NsSeparator => {
                // `namespace\foo(...)`: current-namespace-relative reference
                // in statement position.
                let mut raw = String::new();
                self.expect(TokenKind::NsSeparator)?;
                raw.push_str(&self.expect(TokenKind::Identifier)?.image);
                self.parse_name_tail(&mut raw)?;
                if self.peek() == TokenKind::OpenParen {
                    self.parse_arguments()?;
                }
                self.expect(TokenKind::SemiColon)?;
            }
            _ => return Err(self.unexpected_here()),
        }
        Ok(())
    }

    fn parse_namespace_block(&mut self) -> PResult<()> {
        self.expect(TokenKind::OpenBrace)?;
        loop {
            match self.peek() {
                TokenKind::CloseBrace => {
                    self.next()?;
                    break;
                }
                TokenKind::Eof => return Err(self.token_stream_end()),
                _ => self.parse_top_level_item()?,
            }
        }
        Ok(())
    }

    fn parse_use_statement(&mut self) -> PResult<()> {
        self.next()?; // use
        loop {
            if self.peek() == TokenKind::NsSeparator {
                self.next()?;
            }
            let mut name = self.expect(TokenKind::Identifier)?.image;
            self.parse_name_tail(&mut name)?;
            let alias = if self.peek() == TokenKind::As {
                self.next()?;
                self.expect(TokenKind::Identifier)?.image
            } else {
                name.rsplit('\\').next().unwrap_or_default().to_string()
            };
            self.symbols.add(&alias, &name);
            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::SemiColon)?;
        Ok(())
    }

    fn parse_file_constant(&mut self) -> PResult<()> {
        self.next()?; // const
        loop {
            self.identifier_image()?;
            self.expect(TokenKind::Eq)?;
            self.parse_default_value()?;
            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::SemiColon)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Type declarations
    // ------------------------------------------------------------------

    pub(crate) fn parse_type_declaration(&mut self) -> PResult<TypeId> {
        let doc_comment = self.pending_doc.take();
        self.capture.push();

        let mut modifiers = Modifiers::empty();
        loop {
            match self.peek() {
                TokenKind::Abstract => {
                    self.next()?;
                    modifiers.insert(Modifiers::ABSTRACT);
                }
                TokenKind::Final => {
                    self.next()?;
                    modifiers.insert(Modifiers::FINAL);
                }
                TokenKind::Readonly => {
                    self.next()?;
                    modifiers.insert(Modifiers::READONLY);
                }
                _ => break,
            }
        }

        match self.peek() {
            TokenKind::Class => self.parse_class_rest(doc_comment, modifiers),
            TokenKind::Interface => self.parse_interface_rest(doc_comment),
            TokenKind::Trait => self.parse_trait_rest(doc_comment),
            _ => Err(self.unexpected_here()),
        }
    }

    fn parse_class_rest(&mut self, doc_comment: Option<String>, modifiers: Modifiers) -> PResult<TypeId> {
        self.next()?; // class
        let name = self.expect(TokenKind::Identifier)?.image;
        let namespace_name = self.declaration_namespace(doc_comment.as_deref());
        let qualified = join_qualified(&namespace_name, &name);

        let mut parent_name = None;
        if self.peek() == TokenKind::Extends {
            self.next()?;
            parent_name = Some(self.parse_type_name()?);
        }
        let mut interface_names = Vec::new();
        if self.peek() == TokenKind::Implements {
            self.next()?;
            loop {
                interface_names.push(self.parse_type_name()?);
                if self.peek() == TokenKind::Comma {
                    self.next()?;
                } else {
                    break;
                }
            }
        }

        let saved_ctx = self.class_ctx.replace(ClassCtx {
            qualified_name: qualified,
            parent: parent_name.clone(),
        });

        let mut decl = TypeDecl::new(TypeKind::Class, namespace_name, name);
        decl.modifiers = modifiers;
        decl.doc_comment = doc_comment;
        decl.is_user_defined = true;
        decl.source_file = Some(self.file.clone());
        if let Some(parent) = parent_name.as_deref() {
            decl.parent = Some(self.builder.build_type_ref(parent));
        }
        for interface in &interface_names {
            let reference = self.builder.build_type_ref(interface);
            decl.interfaces.push(reference);
        }

        let result = self.parse_type_body(&mut decl);
        self.class_ctx = saved_ctx;
        result?;

        decl.tokens = self.capture.pop();
        decl.span = span_of(&decl.tokens);
        Ok(self.builder.commit_type(decl))
    }

    fn parse_interface_rest(&mut self, doc_comment: Option<String>) -> PResult<TypeId> {
        self.next()?; // interface
        let name = self.expect(TokenKind::Identifier)?.image;
        let namespace_name = self.declaration_namespace(doc_comment.as_deref());
        let qualified = join_qualified(&namespace_name, &name);

        let mut interface_names = Vec::new();
        if self.peek() == TokenKind::Extends {
            self.next()?;
            loop {
                interface_names.push(self.parse_type_name()?);
                if self.peek() == TokenKind::Comma {
                    self.next()?;
                } else {
                    break;
                }
            }
        }

        let saved_ctx = self.class_ctx.replace(ClassCtx {
            qualified_name: qualified,
            parent: None,
        });

        let mut decl = TypeDecl::new(TypeKind::Interface, namespace_name, name);
        decl.modifiers = Modifiers::ABSTRACT;
        decl.doc_comment = doc_comment;
        decl.is_user_defined = true;
        decl.source_file = Some(self.file.clone());
        for interface in &interface_names {
            let reference = self.builder.build_type_ref(interface);
            decl.interfaces.push(reference);
        }

        let result = self.parse_type_body(&mut decl);
        self.class_ctx = saved_ctx;
        result?;

        decl.tokens = self.capture.pop();
        decl.span = span_of(&decl.tokens);
        Ok(self.builder.commit_type(decl))
    }

    fn parse_trait_rest(&mut self, doc_comment: Option<String>) -> PResult<TypeId> {
        self.next()?; // trait
        let name = self.expect(TokenKind::Identifier)?.image;
        let namespace_name = self.declaration_namespace(doc_comment.as_deref());
        let qualified = join_qualified(&namespace_name, &name);

        let saved_ctx = self.class_ctx.replace(ClassCtx {
            qualified_name: qualified,
            parent: None,
        });

        let mut decl = TypeDecl::new(TypeKind::Trait, namespace_name, name);
        decl.doc_comment = doc_comment;
        decl.is_user_defined = true;
        decl.source_file = Some(self.file.clone());

        let result = self.parse_type_body(&mut decl);
        self.class_ctx = saved_ctx;
        result?;

        decl.tokens = self.capture.pop();
        decl.span = span_of(&decl.tokens);
        Ok(self.builder.commit_type(decl))
    }

    fn parse_type_body(&mut self, decl: &mut TypeDecl) -> PResult<()> {
        self.expect(TokenKind::OpenBrace)?;
        let mut modifiers = Modifiers::empty();
        loop {
            match self.peek() {
                TokenKind::CloseBrace => {
                    self.next()?;
                    break;
                }
                TokenKind::Eof => return Err(self.token_stream_end()),
                TokenKind::Public => {
                    self.next()?;
                    modifiers.insert(Modifiers::PUBLIC);
                }
                TokenKind::Protected => {
                    self.next()?;
                    modifiers.insert(Modifiers::PROTECTED);
                }
                TokenKind::Private => {
                    self.next()?;
                    modifiers.insert(Modifiers::PRIVATE);
                }
                TokenKind::Static => {
                    self.next()?;
                    modifiers.insert(Modifiers::STATIC);
                }
                TokenKind::Abstract => {
                    self.next()?;
                    modifiers.insert(Modifiers::ABSTRACT);
                }
                TokenKind::Final => {
                    self.next()?;
                    modifiers.insert(Modifiers::FINAL);
                }
                TokenKind::Readonly => {
                    self.next()?;
                    modifiers.insert(Modifiers::READONLY);
                }
                TokenKind::Var => {
                    // Legacy public property marker.
                    self.next()?;
                    if decl.kind == TypeKind::Interface {
                        return Err(self.unexpected_here());
                    }
                    self.parse_property_rest(decl, modifiers)?;
                    modifiers = Modifiers::empty();
                }
                TokenKind::Function => {
                    let method = self.parse_method_rest(modifiers, decl.kind)?;
                    decl.methods.push(method);
                    modifiers = Modifiers::empty();
                }
                TokenKind::Variable => {
                    if decl.kind == TypeKind::Interface {
                        return Err(self.unexpected_here());
                    }
                    self.parse_property_rest(decl, modifiers)?;
                    modifiers = Modifiers::empty();
                }
                TokenKind::Const => {
                    self.parse_constant_rest(decl)?;
                    modifiers = Modifiers::empty();
                }
                TokenKind::Use => {
                    if decl.kind == TypeKind::Interface {
                        return Err(self.unexpected_here());
                    }
                    self.parse_trait_use_rest(decl)?;
                    modifiers = Modifiers::empty();
                }
                _ => return Err(self.unexpected_here()),
            }
        }
        Ok(())
    }

    fn parse_method_rest(&mut self, modifiers: Modifiers, kind: TypeKind) -> PResult<Callable> {
        self.capture.push();
        let doc_comment = self.pending_doc.take();

        self.next()?; // function
        let returns_reference = if self.peek() == TokenKind::Ampersand {
            self.next()?;
            true
        } else {
            false
        };
        let name = self.identifier_image()?;

        let mut callable = Callable::new(name);
        callable.modifiers = modifiers;
        callable.doc_comment = doc_comment;
        callable.returns_reference = returns_reference;
        if kind == TypeKind::Interface {
            callable.modifiers.insert(Modifiers::ABSTRACT);
        }

        callable.parameters = self.parse_parameter_list()?;
        callable.return_type = self.parse_return_hint()?;

        match self.peek() {
            TokenKind::OpenBrace => {
                if kind == TypeKind::Interface {
                    return Err(self.unexpected_here());
                }
                self.deps.push(Vec::new());
                self.statics.push(IndexMap::new());
                let body = self.parse_scope();
                callable.dependencies = self.deps.pop().unwrap_or_default();
                callable.static_variables = self.statics.pop().unwrap_or_default();
                callable.body = Some(body?);
            }
            TokenKind::SemiColon => {
                self.next()?;
                callable.modifiers.insert(Modifiers::ABSTRACT);
            }
            _ => return Err(self.unexpected_here()),
        }

        self.apply_callable_annotations(&mut callable);
        callable.tokens = self.capture.pop();
        callable.span = span_of(&callable.tokens);
        Ok(callable)
    }

    fn parse_function_declaration(&mut self) -> PResult<()> {
        self.capture.push();
        let doc_comment = self.pending_doc.take();

        self.next()?; // function
        let returns_reference = if self.peek() == TokenKind::Ampersand {
            self.next()?;
            true
        } else {
            false
        };

        if self.peek() != TokenKind::Identifier {
            // Anonymous function in statement position; the open capture
            // frame belongs to the closure expression.
            self.parse_closure_rest()?;
            if self.peek() == TokenKind::SemiColon {
                self.next()?;
            }
            return Ok(());
        }

        let name = self.next()?.image;
        let mut callable = Callable::new(name);
        callable.doc_comment = doc_comment;
        callable.returns_reference = returns_reference;
        callable.parameters = self.parse_parameter_list()?;
        callable.return_type = self.parse_return_hint()?;

        self.deps.push(Vec::new());
        self.statics.push(IndexMap::new());
        let body = self.parse_scope();
        callable.dependencies = self.deps.pop().unwrap_or_default();
        callable.static_variables = self.statics.pop().unwrap_or_default();
        callable.body = Some(body?);

        self.apply_callable_annotations(&mut callable);
        callable.tokens = self.capture.pop();
        callable.span = span_of(&callable.tokens);

        let namespace_name = self.declaration_namespace(callable.doc_comment.as_deref());
        let decl = FunctionDecl {
            namespace_name,
            source_file: Some(self.file.clone()),
            callable,
        };
        self.builder.commit_function(decl);
        Ok(())
    }

    fn apply_callable_annotations(&mut self, callable: &mut Callable) {
        if self.config.ignore_annotations {
            return;
        }
        let comment = match &callable.doc_comment {
            Some(comment) => comment.clone(),
            None => return,
        };
        if callable.return_type.is_none() {
            if let Some(annotated) = doc::tag_type(&comment, "@return") {
                let resolved = self.resolve_name(&annotated);
                callable.return_type = Some(self.builder.build_type_ref(&resolved));
            }
        }
        for thrown in doc::throws_types(&comment) {
            let resolved = self.resolve_name(&thrown);
            let reference = self.builder.build_type_ref(&resolved);
            callable.exception_types.push(reference);
        }
        // Declaration hints win over @param annotations.
        for index in 0..callable.parameters.len() {
            if callable.parameters[index].type_ref.is_some() {
                continue;
            }
            let name = callable.parameters[index].name.clone();
            if let Some(annotated) = doc::param_type(&comment, &name) {
                let resolved = self.resolve_name(&annotated);
                callable.parameters[index].type_ref =
                    Some(self.builder.build_type_ref(&resolved));
            }
        }
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    fn parse_property_rest(&mut self, decl: &mut TypeDecl, modifiers: Modifiers) -> PResult<()> {
        let doc_comment = self.pending_doc.take();
        let annotated_type = if self.config.ignore_annotations {
            None
        } else {
            doc_comment
                .as_deref()
                .and_then(|comment| doc::tag_type(comment, "@var"))
                .map(|raw| self.resolve_name(&raw))
        };

        loop {
            self.capture.push();
            let name_token = self.expect(TokenKind::Variable)?;
            let default = if self.peek() == TokenKind::Eq {
                self.next()?;
                Some(self.parse_default_value()?)
            } else {
                None
            };
            let tokens = self.capture.pop();

            let type_ref = annotated_type
                .as_deref()
                .map(|name| self.builder.build_type_ref(name));
            decl.properties.push(Property {
                name: name_token.image,
                modifiers,
                type_ref,
                default,
                doc_comment: doc_comment.clone(),
                span: span_of(&tokens),
            });

            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::SemiColon)?;
        Ok(())
    }

    fn parse_constant_rest(&mut self, decl: &mut TypeDecl) -> PResult<()> {
        let doc_comment = self.pending_doc.take();
        self.next()?; // const
        loop {
            self.capture.push();
            let name = self.identifier_image()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_default_value()?;
            let tokens = self.capture.pop();

            decl.constants.push(Constant {
                name,
                value: Some(value),
                doc_comment: doc_comment.clone(),
                span: span_of(&tokens),
            });

            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::SemiColon)?;
        Ok(())
    }

    fn parse_trait_use_rest(&mut self, decl: &mut TypeDecl) -> PResult<()> {
        self.next()?; // use
        loop {
            let name = self.parse_type_name()?;
            let reference = self.builder.build_type_ref(&name);
            decl.trait_uses.push(reference);
            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }
        if self.peek() == TokenKind::OpenBrace {
            // Conflict-resolution block; consumed, not modeled.
            self.next()?;
            self.consume_balanced(TokenKind::OpenBrace, TokenKind::CloseBrace)?;
        } else {
            self.expect(TokenKind::SemiColon)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Parameters, hints, default values
    // ------------------------------------------------------------------

    pub(crate) fn parse_parameter_list(&mut self) -> PResult<Vec<Parameter>> {
        self.expect(TokenKind::OpenParen)?;
        let mut parameters = Vec::new();
        while self.peek() != TokenKind::CloseParen {
            if self.peek() == TokenKind::Eof {
                return Err(self.token_stream_end());
            }
            self.capture.push();
            let parsed = self.parse_parameter(parameters.len());
            let tokens = self.capture.pop();
            let mut parameter = parsed?;
            parameter.span = span_of(&tokens);
            parameters.push(parameter);
            if self.peek() == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;
        Ok(parameters)
    }

    fn parse_parameter(&mut self, position: usize) -> PResult<Parameter> {
        if self.peek() == TokenKind::Question {
            self.next()?;
        }

        let mut is_array = false;
        let mut type_ref = None;
        match self.peek() {
            TokenKind::Array => {
                self.next()?;
                is_array = true;
            }
            TokenKind::SelfType => {
                let token = self.next()?;
                type_ref = Some(self.self_type_ref(&token, "self")?);
            }
            TokenKind::ParentType => {
                let token = self.next()?;
                type_ref = Some(self.parent_type_ref(&token)?);
            }
            kind if kind.starts_name() => {
                let parsed = self.parse_name_raw()?;
                if !is_scalar_hint(&parsed) {
                    let resolved = self.resolve_parsed(&parsed);
                    type_ref = Some(self.builder.build_type_ref(&resolved));
                }
            }
            _ => {}
        }

        let by_reference = if self.peek() == TokenKind::Ampersand {
            self.next()?;
            true
        } else {
            false
        };
        if self.peek() == TokenKind::Ellipsis {
            self.next()?;
        }
        let name_token = self.expect(TokenKind::Variable)?;
        let default = if self.peek() == TokenKind::Eq {
            self.next()?;
            Some(self.parse_default_value()?)
        } else {
            None
        };

        Ok(Parameter {
            name: name_token.image,
            position,
            type_ref,
            is_array,
            by_reference,
            default,
            span: Default::default(),
        })
    }

    pub(crate) fn parse_return_hint(&mut self) -> PResult<Option<Rc<TypeRef>>> {
        if self.peek() != TokenKind::Colon {
            return Ok(None);
        }
        self.next()?;
        if self.peek() == TokenKind::Question {
            self.next()?;
        }
        match self.peek() {
            TokenKind::Array => {
                self.next()?;
                Ok(None)
            }
            TokenKind::SelfType => {
                let token = self.next()?;
                Ok(Some(self.self_type_ref(&token, "self")?))
            }
            TokenKind::Static => {
                // Late static binding degrades to the enclosing class.
                let token = self.next()?;
                Ok(Some(self.self_type_ref(&token, "static")?))
            }
            TokenKind::ParentType => {
                let token = self.next()?;
                Ok(Some(self.parent_type_ref(&token)?))
            }
            kind if kind.starts_name() => {
                let parsed = self.parse_name_raw()?;
                if is_scalar_hint(&parsed) {
                    Ok(None)
                } else {
                    let resolved = self.resolve_parsed(&parsed);
                    Ok(Some(self.builder.build_type_ref(&resolved)))
                }
            }
            _ => Err(self.unexpected_here()),
        }
    }

    /// Parse an initializer into the small value model. Sign is tracked
    /// for numeric literals; array values are token-consumed only.
    pub(crate) fn parse_default_value(&mut self) -> PResult<DefaultValue> {
        let mut negative = false;
        loop {
            match self.peek() {
                TokenKind::Minus => {
                    self.next()?;
                    negative = !negative;
                }
                TokenKind::Plus => {
                    self.next()?;
                }
                _ => break,
            }
        }

        match self.peek() {
            TokenKind::LNumber => {
                let token = self.next()?;
                let value = parse_int_image(&token.image);
                Ok(DefaultValue::Int(if negative { -value } else { value }))
            }
            TokenKind::DNumber => {
                let token = self.next()?;
                let value = token.image.replace('_', "").parse::<f64>().unwrap_or(0.0);
                Ok(DefaultValue::Float(if negative { -value } else { value }))
            }
            TokenKind::StringLiteral => {
                let token = self.next()?;
                Ok(DefaultValue::Str(unquote(&token.image)))
            }
            TokenKind::True => {
                self.next()?;
                Ok(DefaultValue::Bool(true))
            }
            TokenKind::False => {
                self.next()?;
                Ok(DefaultValue::Bool(false))
            }
            TokenKind::Null => {
                self.next()?;
                Ok(DefaultValue::Null)
            }
            TokenKind::Array => {
                self.next()?;
                self.expect(TokenKind::OpenParen)?;
                self.consume_balanced(TokenKind::OpenParen, TokenKind::CloseParen)?;
                Ok(DefaultValue::Array)
            }
            TokenKind::OpenBracket => {
                self.next()?;
                self.consume_balanced(TokenKind::OpenBracket, TokenKind::CloseBracket)?;
                Ok(DefaultValue::Array)
            }
            TokenKind::SelfType => {
                let token = self.next()?;
                let class = self.self_qualified(&token, "self")?;
                self.expect(TokenKind::DoubleColon)?;
                let constant = self.identifier_image()?;
                Ok(DefaultValue::ClassConstant(format!("{}::{}", class, constant)))
            }
            TokenKind::ParentType => {
                let token = self.next()?;
                let class = self.parent_qualified(&token)?;
                self.expect(TokenKind::DoubleColon)?;
                let constant = self.identifier_image()?;
                Ok(DefaultValue::ClassConstant(format!("{}::{}", class, constant)))
            }
            kind if kind.starts_name() => {
                let parsed = self.parse_name_raw()?;
                if self.peek() == TokenKind::DoubleColon {
                    self.next()?;
                    let constant = self.identifier_image()?;
                    let class = self.resolve_parsed(&parsed);
                    Ok(DefaultValue::ClassConstant(format!("{}::{}", class, constant)))
                } else {
                    Ok(DefaultValue::Constant(parsed.raw))
                }
            }
            TokenKind::Eof => Err(self.token_stream_end()),
            _ => {
                let token = self.next()?;
                Err(ParseError::MissingValue {
                    line: token.start_line,
                    col: token.start_col,
                    file: self.file.clone(),
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Small shared helpers
    // ------------------------------------------------------------------

    /// Consume a member/constant name: a plain identifier or a keyword
    /// used as an identifier.
    pub(crate) fn identifier_image(&mut self) -> PResult<String> {
        let token = self.next()?;
        if token.kind == TokenKind::Identifier || token.kind.is_keyword() {
            Ok(token.image)
        } else {
            Err(self.unexpected(&token))
        }
    }

    /// Consume tokens until the matching closer; `open` has already been
    /// consumed. Nested pairs of the same kind are tracked.
    pub(crate) fn consume_balanced(&mut self, open: TokenKind, close: TokenKind) -> PResult<()> {
        let mut depth = 1usize;
        loop {
            let kind = self.peek();
            if kind == TokenKind::Eof {
                return Err(self.token_stream_end());
            }
            if kind == open {
                depth += 1;
            } else if kind == close {
                depth -= 1;
                if depth == 0 {
                    self.next()?;
                    return Ok(());
                }
            }
            self.next()?;
        }
    }
}

fn is_scalar_hint(name: &ParsedName) -> bool {
    !name.relative && !name.raw.contains('\\') && doc::is_scalar_name(&name.raw)
}

/// Integer literal image to value, honoring hex/binary/octal prefixes and
/// digit separators. Out-of-range literals saturate.
fn parse_int_image(image: &str) -> i64 {
    let digits = image.replace('_', "");
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<i64>()
    };
    parsed.unwrap_or(i64::MAX)
}

/// Strip quotes and process the escape sequences the value model keeps.
fn unquote(image: &str) -> String {
    let bytes = image.as_bytes();
    if bytes.len() < 2 {
        return image.to_string();
    }
    let quote = bytes[0];
    let inner = &image[1..image.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('\'') if quote == b'\'' => out.push('\''),
            Some('"') if quote == b'"' => out.push('"'),
            Some('n') if quote == b'"' => out.push('\n'),
            Some('t') if quote == b'"' => out.push('\t'),
            Some('r') if quote == b'"' => out.push('\r'),
            Some('$') if quote == b'"' => out.push('$'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
