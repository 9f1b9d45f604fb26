//! Recursive-descent parser (C3): turns a token stream into the node tree,
//! one rule function per grammar production.
//!
//! Each rule returns `Result<bool>`, so a hard syntax error propagates with
//! `?` rather than the rule silently falling through. The operand stack
//! (`stack`) holds `NodeId`s rather than owned nodes; nodes are never moved,
//! only addressed.

use crate::errors::{AlgoFsmError, Result};
use crate::lexer::{Lexer, TokenKind};
use crate::node::{NodeId, NodeKind, NodeStore};
use crate::util;

pub struct Parser<'a> {
    lex: Lexer<'a>,
    pub store: NodeStore,
    stack: Vec<NodeId>,
    tick_num: u32,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, file_base: impl Into<String>, line_base: usize) -> Self {
        Self {
            lex: Lexer::new(input, file_base, line_base),
            store: NodeStore::new(),
            stack: Vec::new(),
            tick_num: 0,
        }
    }

    /// Entry point: parse `rule_sentences rule_end`, returning the root node.
    pub fn parse(&mut self) -> Result<NodeId> {
        if self.rule_sentences()? && self.rule_end()? {
            return Ok(*self.stack.last().expect("root left on stack"));
        }
        Err(self.error("Expecting rule_sentences"))
    }

    fn push(&mut self, id: NodeId) -> bool {
        self.stack.push(id);
        true
    }

    fn pop(&mut self, n: usize) -> Vec<NodeId> {
        let at = self.stack.len() - n;
        self.stack.split_off(at)
    }

    fn must(&mut self, ok: bool, msg: &str) -> Result<()> {
        if !ok {
            return Err(self.error(msg));
        }
        Ok(())
    }

    fn error(&mut self, msg: &str) -> AlgoFsmError {
        AlgoFsmError::Parse {
            file: self.lex.file_base().to_string(),
            line: self.lex.line_for(self.lex.pos()),
            message: msg.to_string(),
        }
    }

    fn rule_end(&mut self) -> Result<bool> {
        self.lex.token_match(TokenKind::Eof)
    }

    fn rule_sentences(&mut self) -> Result<bool> {
        self.one_or_more(Self::rule_sentence)
    }

    /// Runs `rule` until it stops matching, threading results together via
    /// `nxt` the way `TopDown.one_or_more` does: each new top-of-stack node
    /// becomes the previous one's successor.
    fn one_or_more(&mut self, rule: fn(&mut Self) -> Result<bool>) -> Result<bool> {
        if !rule(self)? {
            return Ok(false);
        }
        let first = *self.stack.last().unwrap();
        while rule(self)? {
            let [prev, last] = <[NodeId; 2]>::try_from(self.pop(2)).unwrap();
            self.store.get_mut(prev).nxt = Some(last);
            self.push(last);
        }
        self.pop(1);
        self.push(first);
        Ok(true)
    }

    fn rule_sentence(&mut self) -> Result<bool> {
        if self.rule_if()? {
            return Ok(true);
        }
        if self.rule_while()? {
            return Ok(true);
        }
        if self.rule_block()? {
            return Ok(true);
        }
        if self.rule_tick()? {
            return Ok(true);
        }
        if self.rule_prcomment()? {
            return Ok(true);
        }
        if self.rule_for()? {
            return Ok(true);
        }
        if self.rule_case()? {
            return Ok(true);
        }
        if self.rule_do_while()? {
            return Ok(true);
        }
        self.rule_sn()
    }

    fn rule_if(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::If)? {
            return Ok(false);
        }
        let had_cond = self.rule_pexpr()?;
        self.must(had_cond, "if: Expecting parenthesis expression")?;
        let had_body = self.rule_sentence()?;
        self.must(had_body, "if: Expecting sentence/blk")?;

        let ahead = self.lex.token_ahead()?.kind;
        let n = if ahead != TokenKind::Else {
            let [cond, body_t] = <[NodeId; 2]>::try_from(self.pop(2)).unwrap();
            let cond_code = self.store.get(cond).code.clone();
            let id = self
                .store
                .add(NodeKind::If, cond_code, None, [None, Some(body_t), None]);
            self.store.remove(cond);
            id
        } else {
            self.lex.token_match(TokenKind::Else)?;
            let had_else = self.rule_sentence()?;
            self.must(had_else, "else: Expecting sentence/blk")?;
            let [cond, body_t, body_f] = <[NodeId; 3]>::try_from(self.pop(3)).unwrap();
            let cond_code = self.store.get(cond).code.clone();
            let id = self.store.add(
                NodeKind::If,
                cond_code,
                None,
                [None, Some(body_t), Some(body_f)],
            );
            self.store.remove(cond);
            id
        };
        Ok(self.push(n))
    }

    fn rule_while(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::While)? {
            return Ok(false);
        }
        self.must(self.rule_pexpr()?, "while: Expecting parenthesis expression")?;
        self.must(self.rule_sentence()?, "while: Expecting sentence/blk")?;
        let [cond, body] = <[NodeId; 2]>::try_from(self.pop(2)).unwrap();
        let code = self.store.get(cond).code.clone();
        let n = self
            .store
            .add(NodeKind::While, code, None, [None, Some(body), None]);
        self.store.remove(cond);
        Ok(self.push(n))
    }

    fn rule_do_while(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::Do)? {
            return Ok(false);
        }
        self.must(self.rule_sentence()?, "while: Expecting sentence/blk")?;
        self.lex.token_match(TokenKind::While)?;
        self.must(self.rule_pexpr()?, "while: Expecting parenthesis expression")?;
        self.must(self.lex.token_match(TokenKind::Semicolon)?, "Expected ;")?;
        let [body, cond] = <[NodeId; 2]>::try_from(self.pop(2)).unwrap();
        let code = self.store.get(cond).code.clone();
        let n = self
            .store
            .add(NodeKind::DoWhile, code, None, [None, Some(body), None]);
        self.store.remove(cond);
        Ok(self.push(n))
    }

    fn rule_block(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::Begin)? {
            return Ok(false);
        }
        self.must(self.rule_sentences()?, "Empty block")?;
        self.must(self.lex.token_match(TokenKind::End)?, "Expected end")?;
        Ok(true)
    }

    fn rule_tick(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::Tick)? {
            return Ok(false);
        }
        let n = self
            .store
            .add(NodeKind::Tick, self.tick_num.to_string(), None, [None, None, None]);
        self.push(n);
        self.tick_num += 1;
        self.must(self.lex.token_match(TokenKind::Semicolon)?, "Expected ;")?;
        Ok(true)
    }

    fn rule_for(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::For)? {
            return Ok(false);
        }
        self.must(self.rule_pexpr()?, "for: Expecting parenthesis expression")?;
        self.must(self.rule_sentence()?, "for: Expecting sentence/blk")?;
        let [cond, body] = <[NodeId; 2]>::try_from(self.pop(2)).unwrap();
        let code = self.store.get(cond).code.clone();
        let n = self
            .store
            .add(NodeKind::For, code, None, [None, Some(body), None]);
        self.store.remove(cond);
        Ok(self.push(n))
    }

    fn rule_case(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::Case)? {
            return Ok(false);
        }
        self.must(self.rule_pexpr()?, "case: Expecting parenthesis expression")?;
        self.must(
            self.one_or_more(Self::rule_case_statement)?,
            "need at least one case statement",
        )?;
        self.must(self.lex.token_match(TokenKind::EndCase)?, "expected endcase")?;
        let [cond, body] = <[NodeId; 2]>::try_from(self.pop(2)).unwrap();
        let code = self.store.get(cond).code.clone();
        let n = self
            .store
            .add(NodeKind::Case, code, None, [None, Some(body), None]);
        self.store.remove(cond);
        Ok(self.push(n))
    }

    fn rule_case_statement(&mut self) -> Result<bool> {
        if !self.rule_case_expr()? {
            return Ok(false);
        }
        self.must(self.rule_sentence()?, "case statement: expecting sentence")?;
        let [expr, body] = <[NodeId; 2]>::try_from(self.pop(2)).unwrap();
        let code = self.store.get(expr).code.clone();
        // The case_expr node's text is folded into this arm's own code; the
        // arm can never contain a tick (case/cs bodies reject ticks in the
        // expander), so the source node is tombstoned immediately rather
        // than kept alive as a dangling child[0], unlike the upstream parser.
        self.store.remove(expr);
        let n = self
            .store
            .add(NodeKind::CaseArm, code, None, [None, Some(body), None]);
        Ok(self.push(n))
    }

    /// Scans raw characters up to (but not including) the `:` that closes a
    /// case-arm label, collapsing whitespace out of the label text. On
    /// hitting `;` or EOF first, the scan backtracks and fails.
    fn rule_case_expr(&mut self) -> Result<bool> {
        let backtrack = self.lex.pos();
        let mut inner = String::new();
        loop {
            match self.lex.get_char() {
                None => {
                    self.lex.set_pos(backtrack);
                    return Ok(false);
                }
                Some(';') => {
                    self.lex.set_pos(backtrack);
                    return Ok(false);
                }
                Some(':') => break,
                Some(c) => {
                    if !c.is_whitespace() {
                        inner.push(c);
                    }
                }
            }
        }
        let n = self.store.add(NodeKind::Stmt, inner, None, [None, None, None]);
        Ok(self.push(n))
    }

    /// Captures the text of a balanced `(...)` expression by counting
    /// paren depth char-by-char, so nested parens inside a condition don't
    /// terminate the scan early.
    fn rule_pexpr(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::OpenParen)? {
            return Ok(false);
        }
        let mut inner = String::new();
        let mut depth = 1i32;
        loop {
            let c = self
                .lex
                .get_char()
                .ok_or_else(|| self.error("Unfinished rule_pexpr"))?;
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            if depth > 0 {
                inner.push(c);
            } else {
                break;
            }
        }
        let n = self.store.add(NodeKind::Stmt, inner, None, [None, None, None]);
        Ok(self.push(n))
    }

    fn rule_prcomment(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::PreservedComment)? {
            return Ok(false);
        }
        let text = self.lex.matched_text().to_string();
        let n = self.store.add(NodeKind::Comment, text, None, [None, None, None]);
        Ok(self.push(n))
    }

    fn rule_sn(&mut self) -> Result<bool> {
        if !self.lex.token_match(TokenKind::Sentence)? {
            return Ok(false);
        }
        let text = self.lex.matched_text().to_string();
        let n = self.store.add(NodeKind::Stmt, text.clone(), None, [None, None, None]);
        self.push(n);
        if util::is_nonblocking_assign(&text) {
            return Err(self.error(&format!(
                "non-blocking assignments not allowed within an AlgoFSM block, found: {text}"
            )));
        }
        self.must(self.lex.token_match(TokenKind::Semicolon)?, "Expected ;")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_node<'a>(p: &'a Parser<'a>, id: NodeId) -> &'a crate::node::Node {
        p.store.get(id)
    }

    #[test]
    fn parses_a_single_tick() {
        let mut p = Parser::new("`tick;", "t", 0);
        let root = p.parse().unwrap();
        assert_eq!(root_node(&p, root).kind, NodeKind::Tick);
    }

    #[test]
    fn parses_if_else() {
        let mut p = Parser::new("if (a) `tick; else `tick;", "t", 0);
        let root = p.parse().unwrap();
        assert_eq!(root_node(&p, root).kind, NodeKind::If);
        assert_eq!(root_node(&p, root).code, "a");
        assert!(root_node(&p, root).child[1].is_some());
        assert!(root_node(&p, root).child[2].is_some());
    }

    #[test]
    fn rejects_nonblocking_assignment() {
        let mut p = Parser::new("a <= b;", "t", 0);
        assert!(p.parse().is_err());
    }

    #[test]
    fn parses_case_with_arms() {
        let mut p = Parser::new("case (x) 1: `tick; 2: `tick; endcase", "t", 0);
        let root = p.parse().unwrap();
        assert_eq!(root_node(&p, root).kind, NodeKind::Case);
        assert_eq!(root_node(&p, root).code, "x");
    }

    #[test]
    fn preserves_marked_comments() {
        let mut p = Parser::new("/// keep\n`tick;", "t", 0);
        let root = p.parse().unwrap();
        assert_eq!(root_node(&p, root).kind, NodeKind::Comment);
    }
}
