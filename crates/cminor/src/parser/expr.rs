//! Expression parsing: standard C precedence climbing, down to exactly the
//! operator catalogue spec.md S4.5 enumerates handlers for. Initializer
//! lists and designated initializers are parsed here too since they share
//! the assignment-expression grammar at each leaf.

use cminor_ast::{
    ArrayExpr, AssignOp, AssignmentExpr, BinaryOp, ConditionalExpr, DesignatedInitializer, Expression,
    ExpressionKind, FunctionCallExpr, IdentifierExpr, IdentifierResolution, MemberExpr, SizeofExpr, SizeofOperand,
};

use crate::error::ParseError;
use crate::preprocessor::lexer::{Punct, TokenKind};

use super::Parser;

impl<'t> Parser<'t> {
    /// Assignment-level expression (no top-level comma) - what declarator
    /// initializers, call arguments, and array-size expressions use.
    pub(super) fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_assignment()
    }

    /// Full comma-expression, used where a statement's expression may
    /// chain with `,` (expression statements, `for` init/step clauses).
    pub(super) fn parse_comma_expression(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_assignment()?;
        while self.at_punct(Punct::Comma) {
            let loc = self.loc();
            self.bump();
            let right = self.parse_assignment()?;
            left = Expression::new(ExpressionKind::Comma(Box::new(left), Box::new(right)), loc);
        }
        Ok(left)
    }

    fn parse_assignment(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_conditional()?;
        let op = match self.peek() {
            TokenKind::Punct(Punct::Assign) => Some(AssignOp::Assign),
            TokenKind::Punct(Punct::PlusEq) => Some(AssignOp::AddAssign),
            TokenKind::Punct(Punct::MinusEq) => Some(AssignOp::SubAssign),
            TokenKind::Punct(Punct::StarEq) => Some(AssignOp::MulAssign),
            TokenKind::Punct(Punct::SlashEq) => Some(AssignOp::DivAssign),
            TokenKind::Punct(Punct::PercentEq) => Some(AssignOp::ModAssign),
            TokenKind::Punct(Punct::AmpEq) => Some(AssignOp::AndAssign),
            TokenKind::Punct(Punct::PipeEq) => Some(AssignOp::OrAssign),
            TokenKind::Punct(Punct::CaretEq) => Some(AssignOp::XorAssign),
            TokenKind::Punct(Punct::ShlEq) => Some(AssignOp::LShiftAssign),
            TokenKind::Punct(Punct::ShrEq) => Some(AssignOp::RShiftAssign),
            _ => None,
        };
        match op {
            Some(op) => {
                let loc = self.loc();
                self.bump();
                let right = self.parse_assignment()?;
                Ok(Expression::new(
                    ExpressionKind::Assign(AssignmentExpr {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
                    loc,
                ))
            }
            None => Ok(left),
        }
    }

    fn parse_conditional(&mut self) -> Result<Expression, ParseError> {
        let cond = self.parse_logical_or()?;
        if self.at_punct(Punct::Question) {
            let loc = self.loc();
            self.bump();
            let then_expr = self.parse_expression()?;
            self.eat_punct(Punct::Colon)?;
            let else_expr = self.parse_conditional()?;
            Ok(Expression::new(
                ExpressionKind::Conditional(ConditionalExpr {
                    condition: Box::new(cond),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                }),
                loc,
            ))
        } else {
            Ok(cond)
        }
    }

    fn parse_logical_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.at_punct(Punct::OrOr) {
            let loc = self.loc();
            self.bump();
            let right = self.parse_logical_and()?;
            left = Expression::new(ExpressionKind::LogicalOr(Box::new(left), Box::new(right)), loc);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_bitor()?;
        while self.at_punct(Punct::AndAnd) {
            let loc = self.loc();
            self.bump();
            let right = self.parse_bitor()?;
            left = Expression::new(ExpressionKind::LogicalAnd(Box::new(left), Box::new(right)), loc);
        }
        Ok(left)
    }

    fn parse_bitor(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary_level(Self::parse_bitxor, &[(Punct::Pipe, BinaryOp::BitOr)])
    }

    fn parse_bitxor(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary_level(Self::parse_bitand, &[(Punct::Caret, BinaryOp::BitXor)])
    }

    fn parse_bitand(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary_level(Self::parse_equality, &[(Punct::Amp, BinaryOp::BitAnd)])
    }

    fn parse_equality(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary_level(
            Self::parse_relational,
            &[(Punct::EqEq, BinaryOp::Eq), (Punct::Ne, BinaryOp::Ne)],
        )
    }

    fn parse_relational(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary_level(
            Self::parse_shift,
            &[
                (Punct::Lt, BinaryOp::Lt),
                (Punct::Le, BinaryOp::Le),
                (Punct::Gt, BinaryOp::Gt),
                (Punct::Ge, BinaryOp::Ge),
            ],
        )
    }

    fn parse_shift(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary_level(
            Self::parse_additive,
            &[(Punct::Shl, BinaryOp::LShift), (Punct::Shr, BinaryOp::RShift)],
        )
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary_level(
            Self::parse_multiplicative,
            &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)],
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary_level(
            Self::parse_unary,
            &[
                (Punct::Star, BinaryOp::Mul),
                (Punct::Slash, BinaryOp::Div),
                (Punct::Percent, BinaryOp::Mod),
            ],
        )
    }

    fn parse_binary_level(
        &mut self,
        mut next: impl FnMut(&mut Self) -> Result<Expression, ParseError>,
        ops: &[(Punct, BinaryOp)],
    ) -> Result<Expression, ParseError> {
        let mut left = next(self)?;
        'outer: loop {
            for (p, op) in ops {
                if self.at_punct(*p) {
                    let loc = self.loc();
                    self.bump();
                    let right = next(self)?;
                    left = Expression::new(ExpressionKind::Binary(*op, Box::new(left), Box::new(right)), loc);
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let loc = self.loc();
        match self.peek().clone() {
            TokenKind::Punct(Punct::Minus) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Minus(Box::new(self.parse_unary()?)), loc))
            }
            TokenKind::Punct(Punct::Plus) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Plus(Box::new(self.parse_unary()?)), loc))
            }
            TokenKind::Punct(Punct::Bang) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::LogicalNot(Box::new(self.parse_unary()?)), loc))
            }
            TokenKind::Punct(Punct::Tilde) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::BitNot(Box::new(self.parse_unary()?)), loc))
            }
            TokenKind::Punct(Punct::Amp) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Address(Box::new(self.parse_unary()?)), loc))
            }
            TokenKind::Punct(Punct::Star) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Dereference(Box::new(self.parse_unary()?)), loc))
            }
            TokenKind::Punct(Punct::PlusPlus) => {
                self.bump();
                let target = self.parse_unary()?;
                Ok(Expression::new(
                    ExpressionKind::IncDec {
                        target: Box::new(target),
                        is_increment: true,
                        is_prefix: true,
                    },
                    loc,
                ))
            }
            TokenKind::Punct(Punct::MinusMinus) => {
                self.bump();
                let target = self.parse_unary()?;
                Ok(Expression::new(
                    ExpressionKind::IncDec {
                        target: Box::new(target),
                        is_increment: false,
                        is_prefix: true,
                    },
                    loc,
                ))
            }
            TokenKind::Keyword(crate::preprocessor::lexer::Keyword::Sizeof) => {
                self.bump();
                self.parse_sizeof(loc)
            }
            TokenKind::Punct(Punct::LParen) if self.peek_is_cast() => {
                self.bump();
                let (base, _) = self.parse_type_specifier_base()?;
                let ty = self.parse_abstract_declarator(base)?;
                self.eat_punct(Punct::RParen)?;
                let operand = self.parse_unary()?;
                Ok(Expression::new(
                    ExpressionKind::TypeCast(Parser::parsed_type_to_specifier(&ty), Box::new(operand)),
                    loc,
                ))
            }
            _ => self.parse_postfix(),
        }
    }

    /// Disambiguates `(type)` cast parens from a parenthesized expression
    /// by checking whether a type keyword/typedef-name follows `(`.
    fn peek_is_cast(&self) -> bool {
        let save = self.pos;
        let is_type = {
            let mut probe = Probe { parser: self, pos: save + 1 };
            probe.at_type_start_here()
        };
        is_type
    }

    fn parse_sizeof(&mut self, loc: cminor_ast::Location) -> Result<Expression, ParseError> {
        if self.at_punct(Punct::LParen) {
            let save = self.pos;
            self.bump();
            if self.at_type_start() {
                let (base, _) = self.parse_type_specifier_base()?;
                let ty = self.parse_abstract_declarator(base)?;
                self.eat_punct(Punct::RParen)?;
                return Ok(Expression::new(
                    ExpressionKind::Sizeof(SizeofExpr {
                        operand: SizeofOperand::Type(Parser::parsed_type_to_specifier(&ty)),
                        computed_value: 0,
                    }),
                    loc,
                ));
            }
            self.pos = save;
        }
        let expr = self.parse_unary()?;
        Ok(Expression::new(
            ExpressionKind::Sizeof(SizeofExpr {
                operand: SizeofOperand::Expr(Box::new(expr)),
                computed_value: 0,
            }),
            loc,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            let loc = self.loc();
            match self.peek().clone() {
                TokenKind::Punct(Punct::LBracket) => {
                    self.bump();
                    let index = self.parse_comma_expression()?;
                    self.eat_punct(Punct::RBracket)?;
                    expr = Expression::new(
                        ExpressionKind::Array(ArrayExpr {
                            array: Box::new(expr),
                            index: Box::new(index),
                        }),
                        loc,
                    );
                }
                TokenKind::Punct(Punct::LParen) => {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at_punct(Punct::RParen) {
                        loop {
                            args.push(self.parse_assignment()?);
                            if self.at_punct(Punct::Comma) {
                                self.bump();
                                continue;
                            }
                            break;
                        }
                    }
                    self.eat_punct(Punct::RParen)?;
                    expr = Expression::new(
                        ExpressionKind::Call(FunctionCallExpr {
                            callee: Box::new(expr),
                            arguments: args,
                        }),
                        loc,
                    );
                }
                TokenKind::Punct(Punct::Dot) => {
                    self.bump();
                    let member_name = self.eat_identifier()?;
                    expr = Expression::new(
                        ExpressionKind::Member(MemberExpr {
                            target: Box::new(expr),
                            member_name,
                            via_pointer: false,
                        }),
                        loc,
                    );
                }
                TokenKind::Punct(Punct::Arrow) => {
                    self.bump();
                    let member_name = self.eat_identifier()?;
                    expr = Expression::new(
                        ExpressionKind::Member(MemberExpr {
                            target: Box::new(expr),
                            member_name,
                            via_pointer: true,
                        }),
                        loc,
                    );
                }
                TokenKind::Punct(Punct::PlusPlus) => {
                    self.bump();
                    expr = Expression::new(
                        ExpressionKind::IncDec {
                            target: Box::new(expr),
                            is_increment: true,
                            is_prefix: false,
                        },
                        loc,
                    );
                }
                TokenKind::Punct(Punct::MinusMinus) => {
                    self.bump();
                    expr = Expression::new(
                        ExpressionKind::IncDec {
                            target: Box::new(expr),
                            is_increment: false,
                            is_prefix: false,
                        },
                        loc,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let loc = self.loc();
        match self.peek().clone() {
            TokenKind::IntLiteral(v) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Int(v), loc))
            }
            TokenKind::UIntLiteral(v) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::UInt(v), loc))
            }
            TokenKind::LongLiteral(v) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Long(v), loc))
            }
            TokenKind::ULongLiteral(v) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::ULong(v), loc))
            }
            TokenKind::FloatLiteral(v) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Float(v), loc))
            }
            TokenKind::DoubleLiteral(v) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Double(v), loc))
            }
            TokenKind::CharLiteral(v) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Int(v), loc))
            }
            TokenKind::StringLiteral(bytes) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Str(bytes), loc))
            }
            TokenKind::Keyword(crate::preprocessor::lexer::Keyword::True) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Bool(true), loc))
            }
            TokenKind::Keyword(crate::preprocessor::lexer::Keyword::False) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Bool(false), loc))
            }
            TokenKind::Keyword(crate::preprocessor::lexer::Keyword::Null) => {
                self.bump();
                Ok(Expression::new(ExpressionKind::Null, loc))
            }
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(Expression::new(
                    ExpressionKind::Identifier(IdentifierExpr {
                        name,
                        resolution: IdentifierResolution::Unresolved,
                    }),
                    loc,
                ))
            }
            TokenKind::Punct(Punct::LParen) => {
                self.bump();
                let inner = self.parse_comma_expression()?;
                self.eat_punct(Punct::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Parses either a bare assignment-expression initializer, or a
    /// brace-delimited initializer list whose elements may themselves be
    /// designated (`.field = value`) or plain (spec.md S4.5 "Declarations
    /// at statement level").
    pub(super) fn parse_initializer(&mut self) -> Result<Expression, ParseError> {
        if self.at_punct(Punct::LBrace) {
            let loc = self.loc();
            self.bump();
            let mut elements = Vec::new();
            while !self.at_punct(Punct::RBrace) {
                if self.at_punct(Punct::Dot) {
                    let dloc = self.loc();
                    self.bump();
                    let field_name = self.eat_identifier()?;
                    self.eat_punct(Punct::Assign)?;
                    let value = self.parse_initializer()?;
                    elements.push(Expression::new(
                        ExpressionKind::DesignatedInitializer(DesignatedInitializer {
                            field_name,
                            value: Box::new(value),
                        }),
                        dloc,
                    ));
                } else {
                    elements.push(self.parse_initializer()?);
                }
                if self.at_punct(Punct::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            self.eat_punct(Punct::RBrace)?;
            Ok(Expression::new(ExpressionKind::InitializerList(elements), loc))
        } else {
            self.parse_expression()
        }
    }
}

/// A read-only probe used only to decide whether `(` begins a cast,
/// without committing to consuming tokens on a false branch.
struct Probe<'p, 't> {
    parser: &'p Parser<'t>,
    pos: usize,
}

impl<'p, 't> Probe<'p, 't> {
    fn at_type_start_here(&mut self) -> bool {
        let idx = self.pos.min(self.parser.tokens.len() - 1);
        match &self.parser.tokens[idx].kind {
            TokenKind::Keyword(
                crate::preprocessor::lexer::Keyword::Void
                | crate::preprocessor::lexer::Keyword::Char
                | crate::preprocessor::lexer::Keyword::Short
                | crate::preprocessor::lexer::Keyword::Bool
                | crate::preprocessor::lexer::Keyword::Int
                | crate::preprocessor::lexer::Keyword::Long
                | crate::preprocessor::lexer::Keyword::Float
                | crate::preprocessor::lexer::Keyword::Double
                | crate::preprocessor::lexer::Keyword::Struct
                | crate::preprocessor::lexer::Keyword::Union
                | crate::preprocessor::lexer::Keyword::Enum
                | crate::preprocessor::lexer::Keyword::Const
                | crate::preprocessor::lexer::Keyword::Unsigned,
            ) => true,
            TokenKind::Identifier(name) => self.parser.typedef_names.borrow().contains(name),
            _ => false,
        }
    }
}

/// Constant-folds the narrow subset of expressions that can appear as
/// enum-member initializers or `case` labels: literal ints and `+`/`-`
/// over them (spec.md S3 "Enum definition", S4.5 "Switch / case").
pub(super) fn const_eval(expr: &Expression) -> Option<i64> {
    match &expr.kind {
        ExpressionKind::Int(v) => Some(*v as i64),
        ExpressionKind::UInt(v) => Some(*v as i64),
        ExpressionKind::Long(v) => Some(*v),
        ExpressionKind::ULong(v) => Some(*v as i64),
        ExpressionKind::Minus(inner) => const_eval(inner).map(|v| -v),
        ExpressionKind::Plus(inner) => const_eval(inner),
        ExpressionKind::Binary(BinaryOp::Add, a, b) => Some(const_eval(a)? + const_eval(b)?),
        ExpressionKind::Binary(BinaryOp::Sub, a, b) => Some(const_eval(a)? - const_eval(b)?),
        ExpressionKind::Binary(BinaryOp::Mul, a, b) => Some(const_eval(a)? * const_eval(b)?),
        _ => None,
    }
}
