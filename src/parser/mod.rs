use std::ops::Range;

use crate::CheckError;
use crate::lexer::{Lexer, SpannedToken, Token};
use crate::parser::ast::*;

pub mod ast;

/// Declaration level parser. Type bodies are parsed member by member, method bodies
/// and field initializers are only brace-matched.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    errors: Vec<CheckError>,
    builder: TreeBuilder,
}

fn to_span(token: &SpannedToken) -> SourceSpan {
    SourceSpan {
        start: SourcePosition { line: token.start.0, column: token.start.1 },
        end: SourcePosition { line: token.end.0, column: token.end.1 },
    }
}

impl Parser {
    pub fn new(lexer: &mut Lexer<'_>) -> Self {
        let (tokens, errors) = match lexer.tokenize() {
            Ok(tokens) => (tokens, Vec::new()),
            Err(e) => (Vec::new(), vec![e]),
        };

        Parser {
            tokens,
            pos: 0,
            errors,
            builder: TreeBuilder::new(),
        }
    }

    fn token_at(&self, index: usize) -> &SpannedToken {
        // the lexer always terminates the stream with EOF, so the last token is a safe fallback
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[index.min(last)]
    }

    fn current(&self) -> &Token {
        &self.token_at(self.pos).token
    }

    fn peek_nth(&self, n: usize) -> &Token {
        &self.token_at(self.pos + n).token
    }

    fn current_span(&self) -> SourceSpan {
        to_span(self.token_at(self.pos))
    }

    fn previous_span(&self) -> SourceSpan {
        to_span(self.token_at(self.pos.saturating_sub(1)))
    }

    fn advance(&mut self) {
        if *self.current() != Token::EOF {
            self.pos += 1;
        }
    }

    fn check(&self, token_type: &Token) -> bool {
        self.current() == token_type
    }

    fn match_token(&mut self, token_type: &Token) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: impl Into<String>) -> CheckError {
        let span = self.current_span();
        CheckError::Parse {
            message: message.into(),
            line: span.start.line,
            column: span.start.column,
        }
    }

    fn consume(&mut self, token_type: &Token, context: &str) -> Result<SourceSpan, CheckError> {
        if self.check(token_type) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.error_here(format!(
                "Expected '{}' {}, got '{}'",
                token_type,
                context,
                self.current()
            )))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, CheckError> {
        if let Token::Identifier(name) = self.current() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_here(format!("Expected {}, got '{}'", what, self.current())))
        }
    }

    /// Parses a whole file, the lexer error (if any) is reported first
    pub fn parse_unit(&mut self) -> Result<SyntaxTree, Vec<CheckError>> {
        if !self.errors.is_empty() {
            return Err(std::mem::take(&mut self.errors));
        }

        match self.parse_compilation_unit() {
            Ok(root) => Ok(std::mem::take(&mut self.builder).finish(root)),
            Err(e) => {
                self.errors.push(e);
                Err(std::mem::take(&mut self.errors))
            }
        }
    }

    fn parse_compilation_unit(&mut self) -> Result<SyntaxNode, CheckError> {
        let start = self.current_span();

        let package = if self.match_token(&Token::Package) {
            let name = self.parse_qualified_name()?;
            self.consume(&Token::Semicolon, "after package declaration")?;
            Some(name)
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.match_token(&Token::Import) {
            imports.push(self.parse_import()?);
        }

        let mut types = Vec::new();
        while !self.check(&Token::EOF) {
            if self.match_token(&Token::Semicolon) {
                continue;
            }
            let modifiers = self.parse_modifiers()?;
            types.push(self.parse_type_declaration(modifiers)?);
        }

        let span = start.to(self.previous_span());
        let unit = CompilationUnit::new(package, imports, types);
        Ok(self.builder.node(span, NodeData::CompilationUnit(unit)))
    }

    fn parse_import(&mut self) -> Result<Import, CheckError> {
        let is_static = self.match_token(&Token::Modifier(Modifier::Static));
        let mut path = self.expect_identifier("import path")?;
        let mut is_wildcard = false;

        while self.match_token(&Token::Dot) {
            if self.match_token(&Token::Star) {
                is_wildcard = true;
                break;
            }
            path.push('.');
            path.push_str(&self.expect_identifier("import path")?);
        }

        self.consume(&Token::Semicolon, "after import")?;
        Ok(Import {
            path,
            is_static,
            is_wildcard,
        })
    }

    fn parse_qualified_name(&mut self) -> Result<String, CheckError> {
        let mut name = self.expect_identifier("name")?;
        while self.check(&Token::Dot) && matches!(self.peek_nth(1), Token::Identifier(_)) {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_identifier("name")?);
        }
        Ok(name)
    }

    fn parse_modifiers(&mut self) -> Result<SyntaxNode, CheckError> {
        let start = self.current_span();
        let mut items = Vec::new();

        loop {
            match self.current().clone() {
                Token::Modifier(modifier) => {
                    let span = self.current_span();
                    self.advance();
                    items.push(self.builder.modifier_keyword(modifier, span));
                }
                Token::At if *self.peek_nth(1) != Token::Interface => {
                    let at = self.current_span();
                    self.advance();
                    let name = self.parse_qualified_name()?;
                    if self.check(&Token::LeftParen) {
                        self.skip_balanced(&Token::LeftParen, &Token::RightParen)?;
                    }
                    let span = at.to(self.previous_span());
                    items.push(self.builder.annotation(name, span));
                }
                _ => break,
            }
        }

        let span = match (items.first(), items.last()) {
            (Some(first), Some(last)) => first.span().to(last.span()),
            _ => SourceSpan::empty_at(start.start),
        };
        Ok(self.builder.modifiers(span, items))
    }

    // parameter modifiers are not modelled, only skipped
    fn skip_parameter_modifiers(&mut self) -> Result<(), CheckError> {
        loop {
            if matches!(self.current(), Token::Modifier(_)) {
                self.advance();
            } else if self.match_token(&Token::At) {
                self.parse_qualified_name()?;
                if self.check(&Token::LeftParen) {
                    self.skip_balanced(&Token::LeftParen, &Token::RightParen)?;
                }
            } else {
                return Ok(());
            }
        }
    }

    fn parse_type_declaration(&mut self, modifiers: SyntaxNode) -> Result<SyntaxNode, CheckError> {
        let start = if modifiers.span().is_empty() {
            self.current_span()
        } else {
            modifiers.span()
        };

        let mut keyword = self.current().clone();
        let annotation_type = keyword == Token::At;
        match keyword {
            Token::Class | Token::Interface | Token::Enum => self.advance(),
            Token::At => {
                self.advance();
                self.consume(&Token::Interface, "after '@' in annotation type")?;
                keyword = Token::Interface;
            }
            _ => {
                return Err(self.error_here(format!(
                    "Expected class, interface or enum, got '{}'",
                    keyword
                )));
            }
        }

        let name = self.expect_identifier("type name")?;

        // annotation types are kept as interfaces with an opaque body
        if annotation_type {
            self.skip_balanced(&Token::LeftBrace, &Token::RightBrace)?;
            let span = start.to(self.previous_span());
            let decl = TypeDeclaration::new(modifiers, name, None, Vec::new(), Vec::new());
            return Ok(self.builder.node(span, NodeData::Interface(decl)));
        }

        if self.check(&Token::Less) {
            self.skip_balanced(&Token::Less, &Token::Greater)?;
        }

        let mut superclass = None;
        let mut interfaces = Vec::new();
        if self.match_token(&Token::Extends) {
            if keyword == Token::Interface {
                interfaces = self.parse_type_list()?;
            } else {
                superclass = Some(self.parse_type()?);
            }
        }
        if self.match_token(&Token::Implements) {
            interfaces.extend(self.parse_type_list()?);
        }

        self.consume(&Token::LeftBrace, "to open type body")?;
        if keyword == Token::Enum {
            self.skip_enum_constants()?;
        }

        let mut members = Vec::new();
        while !self.check(&Token::RightBrace) {
            if self.check(&Token::EOF) {
                return Err(self.error_here(format!("Unterminated body of '{}'", name)));
            }
            if self.match_token(&Token::Semicolon) {
                continue;
            }
            members.extend(self.parse_member(&name)?);
        }
        self.consume(&Token::RightBrace, "to close type body")?;

        let span = start.to(self.previous_span());
        let decl = TypeDeclaration::new(modifiers, name, superclass, interfaces, members);
        let data = match keyword {
            Token::Class => NodeData::Class(decl),
            Token::Interface => NodeData::Interface(decl),
            _ => NodeData::Enum(decl),
        };
        Ok(self.builder.node(span, data))
    }

    fn skip_enum_constants(&mut self) -> Result<(), CheckError> {
        while matches!(self.current(), Token::Identifier(_) | Token::At) {
            self.skip_parameter_modifiers()?;
            self.expect_identifier("enum constant")?;
            if self.check(&Token::LeftParen) {
                self.skip_balanced(&Token::LeftParen, &Token::RightParen)?;
            }
            if self.check(&Token::LeftBrace) {
                self.skip_balanced(&Token::LeftBrace, &Token::RightBrace)?;
            }
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.match_token(&Token::Semicolon);
        Ok(())
    }

    /// One member declaration; a field with several declarators yields several nodes
    fn parse_member(&mut self, type_name: &str) -> Result<Vec<SyntaxNode>, CheckError> {
        let static_block = self.check(&Token::Modifier(Modifier::Static))
            && *self.peek_nth(1) == Token::LeftBrace;
        if static_block || self.check(&Token::LeftBrace) {
            return Ok(vec![self.parse_initializer()?]);
        }

        let modifiers = self.parse_modifiers()?;
        let start = if modifiers.span().is_empty() {
            self.current_span()
        } else {
            modifiers.span()
        };

        if matches!(
            self.current(),
            Token::Class | Token::Interface | Token::Enum | Token::At
        ) {
            return Ok(vec![self.parse_type_declaration(modifiers)?]);
        }

        if self.check(&Token::Less) {
            self.skip_balanced(&Token::Less, &Token::Greater)?;
        }

        let is_constructor = matches!(self.current(), Token::Identifier(name) if name == type_name)
            && *self.peek_nth(1) == Token::LeftParen;
        if is_constructor {
            let name = self.expect_identifier("constructor name")?;
            return Ok(vec![self.parse_method_rest(modifiers, start, name, None)?]);
        }

        let return_type = if self.match_token(&Token::Void) {
            "void".to_string()
        } else {
            self.parse_type()?
        };
        let name = self.expect_identifier("member name")?;

        if self.check(&Token::LeftParen) {
            Ok(vec![self.parse_method_rest(modifiers, start, name, Some(return_type))?])
        } else {
            self.parse_fields(modifiers, start, return_type, name)
        }
    }

    fn parse_initializer(&mut self) -> Result<SyntaxNode, CheckError> {
        let start = self.current_span();
        let is_static = self.match_token(&Token::Modifier(Modifier::Static));
        let body = self.parse_block()?;
        let span = start.to(body.span());
        Ok(self
            .builder
            .node(span, NodeData::Initializer(Initializer::new(is_static, body))))
    }

    /// Parameters, throws clause and body of a method or constructor
    fn parse_method_rest(
        &mut self,
        modifiers: SyntaxNode,
        start: SourceSpan,
        name: String,
        return_type: Option<String>,
    ) -> Result<SyntaxNode, CheckError> {
        let parameters = self.parse_parameters()?;

        while self.check(&Token::LeftBracket) {
            self.skip_balanced(&Token::LeftBracket, &Token::RightBracket)?;
        }
        if self.match_token(&Token::Throws) {
            self.parse_type_list()?;
        }

        let body = if self.check(&Token::LeftBrace) {
            Some(self.parse_block()?)
        } else {
            self.consume(&Token::Semicolon, "after method declaration")?;
            None
        };

        let span = start.to(self.previous_span());
        let is_constructor = return_type.is_none();
        let decl = MethodDeclaration::new(modifiers, name, return_type, parameters, body);
        let data = if is_constructor {
            NodeData::Constructor(decl)
        } else {
            NodeData::Method(decl)
        };
        Ok(self.builder.node(span, data))
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, CheckError> {
        self.consume(&Token::LeftParen, "to open parameter list")?;
        let mut parameters = Vec::new();

        if !self.check(&Token::RightParen) {
            loop {
                self.skip_parameter_modifiers()?;
                let mut type_name = self.parse_type()?;
                if self.match_token(&Token::Ellipsis) {
                    type_name.push_str("...");
                }
                let name = self.expect_identifier("parameter name")?;
                self.parse_dimensions(&mut type_name);
                parameters.push(Parameter { type_name, name });

                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        self.consume(&Token::RightParen, "to close parameter list")?;
        Ok(parameters)
    }

    fn parse_fields(
        &mut self,
        modifiers: SyntaxNode,
        start: SourceSpan,
        type_name: String,
        first_name: String,
    ) -> Result<Vec<SyntaxNode>, CheckError> {
        let template = modifiers.clone();
        let mut modifiers = Some(modifiers);
        let mut name = first_name;
        let mut fields = Vec::new();

        loop {
            let mut declared_type = type_name.clone();
            self.parse_dimensions(&mut declared_type);
            if self.match_token(&Token::Equal) {
                self.skip_initializer()?;
            }

            // every declarator owns its own copy of the modifier list
            let mods = match modifiers.take() {
                Some(mods) => mods,
                None => self.reallocate(&template),
            };
            let span = start.to(self.previous_span());
            let decl = VariableDeclaration::new(mods, declared_type, name);
            fields.push(self.builder.node(span, NodeData::Variable(decl)));

            if self.match_token(&Token::Comma) {
                name = self.expect_identifier("field name")?;
                continue;
            }
            self.consume(&Token::Semicolon, "after field declaration")?;
            return Ok(fields);
        }
    }

    fn reallocate(&mut self, node: &SyntaxNode) -> SyntaxNode {
        let data = match node.data() {
            NodeData::Modifiers(list) => {
                let items = list.items().iter().map(|item| self.reallocate(item)).collect();
                NodeData::Modifiers(ModifierList::new(items))
            }
            other => other.clone(),
        };
        self.builder.node(node.span(), data)
    }

    fn skip_initializer(&mut self) -> Result<(), CheckError> {
        let mut depth = 0usize;
        loop {
            match self.current() {
                Token::EOF => return Err(self.error_here("Unterminated field initializer")),
                Token::LeftParen | Token::LeftBrace | Token::LeftBracket => depth += 1,
                Token::RightParen | Token::RightBrace | Token::RightBracket => {
                    if depth == 0 {
                        return Err(self.error_here(format!(
                            "Unexpected '{}' in field initializer",
                            self.current()
                        )));
                    }
                    depth -= 1;
                }
                Token::Semicolon if depth == 0 => return Ok(()),
                // commas between type arguments are not followed by a declarator
                Token::Comma if depth == 0 && self.next_is_declarator() => return Ok(()),
                _ => {}
            }
            self.advance();
        }
    }

    fn next_is_declarator(&self) -> bool {
        matches!(self.peek_nth(1), Token::Identifier(_))
            && matches!(
                self.peek_nth(2),
                Token::Equal | Token::Comma | Token::Semicolon
            )
    }

    fn parse_type(&mut self) -> Result<String, CheckError> {
        let mut text = self.expect_identifier("type")?;

        loop {
            if self.check(&Token::Less) {
                let range = self.skip_balanced(&Token::Less, &Token::Greater)?;
                text.push_str(&self.text_of(range));
            }
            if self.check(&Token::Dot) && matches!(self.peek_nth(1), Token::Identifier(_)) {
                self.advance();
                text.push('.');
                text.push_str(&self.expect_identifier("type")?);
                continue;
            }
            break;
        }

        self.parse_dimensions(&mut text);
        Ok(text)
    }

    fn parse_type_list(&mut self) -> Result<Vec<String>, CheckError> {
        let mut types = vec![self.parse_type()?];
        while self.match_token(&Token::Comma) {
            types.push(self.parse_type()?);
        }
        Ok(types)
    }

    fn parse_dimensions(&mut self, type_name: &mut String) {
        while self.check(&Token::LeftBracket) && *self.peek_nth(1) == Token::RightBracket {
            self.advance();
            self.advance();
            type_name.push_str("[]");
        }
    }

    fn parse_block(&mut self) -> Result<SyntaxNode, CheckError> {
        let range = self.skip_balanced(&Token::LeftBrace, &Token::RightBrace)?;
        let span = to_span(self.token_at(range.start)).to(self.previous_span());
        let block = Block::new(range.len().saturating_sub(2));
        Ok(self.builder.node(span, NodeData::Block(block)))
    }

    /// Consumes `open ... close` with nesting, returns the consumed token range
    fn skip_balanced(&mut self, open: &Token, close: &Token) -> Result<Range<usize>, CheckError> {
        let start = self.pos;
        let opening = self.consume(open, "to open group")?;
        let mut depth = 1usize;

        while depth > 0 {
            if self.check(&Token::EOF) {
                return Err(CheckError::Parse {
                    message: format!("Unbalanced '{}'", open),
                    line: opening.start.line,
                    column: opening.start.column,
                });
            }
            if self.check(open) {
                depth += 1;
            } else if self.check(close) {
                depth -= 1;
            }
            self.advance();
        }

        Ok(start..self.pos)
    }

    fn text_of(&self, range: Range<usize>) -> String {
        let mut text = String::new();
        for token in &self.tokens[range] {
            text.push_str(&token.token.to_string());
            if token.token == Token::Comma {
                text.push(' ');
            }
        }
        text
    }
}
