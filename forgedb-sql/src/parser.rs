//! A recursive-descent parser over the [`token`](crate::token) stream,
//! producing the parsed-statement contract forgedb's executor consumes
//! (§6.1). This is the sole producer of [`Statement`] values; the
//! executor itself never looks at SQL text.

use std::collections::BTreeSet;

use forgedb::catalog::Column;
use forgedb::merge::MergeSpec;
use forgedb::statement::{
    CmpOp, ColumnRef, Condition, CreateStmt, DeleteStmt, DropStmt, InsertStmt, JoinClause, LoadStmt, OrderBy,
    ProjectionItem, SaveStmt, SelectStmt, SetStmt, Statement, UpdateStmt,
};
use forgedb::value::{ColumnType, Value};

use crate::token::{tokenize, Token, TokenKind};

type PResult<T> = Result<T, String>;

/// Parses one statement out of `sql`. Never panics: a malformed
/// statement comes back as `Statement::Invalid(message)` rather than an
/// `Err`, since that is the contract the executor's `Session::execute`
/// dispatches on (§6.1, §6.3).
pub fn parse(sql: &str) -> Statement {
    let sql = sql.trim().trim_end_matches(';');
    match tokenize(sql).and_then(|tokens| Parser::new(&tokens).parse_statement()) {
        Ok(stmt) => stmt,
        Err(message) => Statement::Invalid(message),
    }
}

struct Parser<'a, 'b> {
    tokens: &'b [Token<'a>],
    pos: usize,
}

impl<'a, 'b> Parser<'a, 'b> {
    fn new(tokens: &'b [Token<'a>]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token<'a> {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> &Token<'a> {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at_eoi(&self) -> bool {
        self.peek_kind() == TokenKind::EOI
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token<'a>> {
        if self.peek_kind() == kind {
            Ok(self.advance().clone())
        } else {
            Err(format!("expected {:?}, found '{}'", kind, self.peek().slice))
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> PResult<String> {
        if self.peek_kind() == TokenKind::Ident {
            Ok(self.advance().slice.to_string())
        } else {
            Err(format!("expected identifier, found '{}'", self.peek().slice))
        }
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        let stmt = match self.peek_kind() {
            TokenKind::CREATE => self.parse_create(),
            TokenKind::DROP => self.parse_drop(),
            TokenKind::INSERT => self.parse_insert(),
            TokenKind::UPDATE => self.parse_update(),
            TokenKind::DELETE => self.parse_delete(),
            TokenKind::SELECT => self.parse_select(),
            TokenKind::SET => self.parse_set(),
            TokenKind::SAVE => self.parse_save(),
            TokenKind::LOAD => self.parse_load(),
            TokenKind::BEGIN => {
                self.advance();
                self.eat(TokenKind::TRANSACTION);
                Ok(Statement::Begin)
            }
            TokenKind::COMMIT | TokenKind::END => {
                self.advance();
                Ok(Statement::Commit)
            }
            TokenKind::ROLLBACK => {
                self.advance();
                Ok(Statement::Rollback)
            }
            TokenKind::EXIT | TokenKind::QUIT => {
                self.advance();
                Ok(Statement::Exit)
            }
            TokenKind::EOI => Err("empty statement".to_string()),
            other => Err(format!("unsupported statement starting with {:?} ('{}')", other, self.peek().slice)),
        }?;

        if !self.at_eoi() {
            return Err(format!("unexpected trailing input at '{}'", self.peek().slice));
        }
        Ok(stmt)
    }

    // ---- CREATE TABLE ----

    fn parse_create(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::CREATE)?;
        self.expect(TokenKind::TABLE)?;
        let table = self.ident()?;
        self.expect(TokenKind::LParen)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(Statement::Create(CreateStmt { table, columns }))
    }

    fn parse_column_def(&mut self) -> PResult<Column> {
        let name = self.ident()?;
        let col_type = self.parse_column_type()?;
        let mut column = Column::new(name, col_type);

        loop {
            match self.peek_kind() {
                TokenKind::PRIMARY => {
                    self.advance();
                    self.expect(TokenKind::KEY)?;
                    column.primary_key = true;
                }
                TokenKind::MERGE => {
                    self.advance();
                    column.merge = self.parse_merge_spec()?;
                }
                _ => break,
            }
        }
        Ok(column)
    }

    fn parse_column_type(&mut self) -> PResult<ColumnType> {
        match self.advance().kind {
            TokenKind::INT | TokenKind::INTEGER => Ok(ColumnType::Int),
            TokenKind::DOUBLE | TokenKind::FLOAT => Ok(ColumnType::Double),
            TokenKind::TEXT => Ok(ColumnType::Text),
            TokenKind::SET => {
                self.expect(TokenKind::Lt)?;
                self.expect(TokenKind::TEXT)?;
                self.expect(TokenKind::Gt)?;
                Ok(ColumnType::SetText)
            }
            TokenKind::VECTOR => {
                self.expect(TokenKind::Lt)?;
                let dim = self.literal_usize()?;
                self.expect(TokenKind::Gt)?;
                if dim == 0 {
                    return Err("VECTOR dimension must be > 0".to_string());
                }
                Ok(ColumnType::Vector(dim))
            }
            other => Err(format!("unknown column type {:?}", other)),
        }
    }

    fn parse_merge_spec(&mut self) -> PResult<MergeSpec> {
        match self.advance().kind {
            TokenKind::LWW => Ok(MergeSpec::Lww),
            TokenKind::GSET => Ok(MergeSpec::Gset),
            TokenKind::SUM_BOUNDED => {
                self.expect(TokenKind::LParen)?;
                let min = self.literal_i64()?;
                self.expect(TokenKind::Comma)?;
                let max = self.literal_i64()?;
                self.expect(TokenKind::RParen)?;
                Ok(MergeSpec::SumBounded(min, max))
            }
            other => Err(format!("unknown MERGE spec {:?}", other)),
        }
    }

    // ---- DROP TABLE ----

    fn parse_drop(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::DROP)?;
        self.expect(TokenKind::TABLE)?;
        let table = self.ident()?;
        Ok(Statement::Drop(DropStmt { table }))
    }

    // ---- INSERT ----

    fn parse_insert(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::INSERT)?;
        self.expect(TokenKind::INTO)?;
        let table = self.ident()?;

        self.expect(TokenKind::LParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.ident()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::VALUES)?;
        let mut rows = Vec::new();
        loop {
            self.expect(TokenKind::LParen)?;
            let mut row = Vec::new();
            loop {
                row.push(self.parse_value_literal()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            rows.push(row);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        let on_conflict_merge = if self.eat(TokenKind::ON) {
            self.expect(TokenKind::CONFLICT)?;
            self.expect(TokenKind::MERGE)?;
            true
        } else {
            false
        };

        Ok(Statement::Insert(InsertStmt { table, columns, rows, on_conflict_merge }))
    }

    // ---- UPDATE ----

    fn parse_update(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::UPDATE)?;
        let table = self.ident()?;
        self.expect(TokenKind::SET)?;

        let mut assignments = Vec::new();
        loop {
            let name = self.ident()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_value_literal()?;
            assignments.push((name, value));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        let where_clause = self.parse_optional_where()?;

        let valid_period = if self.eat(TokenKind::VALID) {
            self.expect(TokenKind::PERIOD)?;
            self.expect(TokenKind::LBracket)?;
            let from = self.quoted_string()?;
            self.expect(TokenKind::Comma)?;
            let to = self.quoted_string()?;
            self.expect(TokenKind::RParen)?;
            Some((from, to))
        } else {
            None
        };

        Ok(Statement::Update(UpdateStmt { table, assignments, where_clause, valid_period }))
    }

    // ---- DELETE ----

    fn parse_delete(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::DELETE)?;
        self.expect(TokenKind::FROM)?;
        let table = self.ident()?;
        let where_clause = self.parse_optional_where()?;
        Ok(Statement::Delete(DeleteStmt { table, where_clause }))
    }

    // ---- SELECT ----

    fn parse_select(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::SELECT)?;
        let projections = self.parse_projection_list()?;
        self.expect(TokenKind::FROM)?;
        let table = self.ident()?;

        let join = if self.eat(TokenKind::JOIN) {
            let right_table = self.ident()?;
            self.expect(TokenKind::ON)?;
            let left_column = self.parse_column_ref()?;
            self.expect(TokenKind::Eq)?;
            let right_column = self.parse_column_ref()?;
            Some(JoinClause { right_table, left_column, right_column })
        } else {
            None
        };

        let as_of_tx = if self.eat(TokenKind::FOR) {
            self.expect(TokenKind::SYSTEM_TIME)?;
            self.expect(TokenKind::AS)?;
            self.expect(TokenKind::OF)?;
            self.expect(TokenKind::TX)?;
            Some(self.literal_i64()?)
        } else {
            None
        };

        let where_clause = self.parse_optional_where()?;

        let group_by = if self.eat(TokenKind::GROUP) {
            self.expect(TokenKind::BY)?;
            let mut cols = vec![self.ident()?];
            while self.eat(TokenKind::Comma) {
                cols.push(self.ident()?);
            }
            cols
        } else {
            Vec::new()
        };

        let order_by = if self.eat(TokenKind::ORDER) {
            self.expect(TokenKind::BY)?;
            let column = self.ident()?;
            let descending = self.eat(TokenKind::DESC);
            let _ = self.eat(TokenKind::ASC);
            Some(OrderBy { column, descending })
        } else {
            None
        };

        let limit = if self.eat(TokenKind::LIMIT) { Some(self.literal_usize()?) } else { None };

        Ok(Statement::Select(SelectStmt {
            projections,
            table,
            join,
            as_of_tx,
            where_clause,
            group_by,
            order_by,
            limit,
        }))
    }

    fn parse_projection_list(&mut self) -> PResult<Vec<ProjectionItem>> {
        let mut items = vec![self.parse_projection_item()?];
        while self.eat(TokenKind::Comma) {
            items.push(self.parse_projection_item()?);
        }
        Ok(items)
    }

    fn parse_projection_item(&mut self) -> PResult<ProjectionItem> {
        match self.peek_kind() {
            TokenKind::Star => {
                self.advance();
                Ok(ProjectionItem::Star)
            }
            TokenKind::COUNT => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                self.expect(TokenKind::Star)?;
                self.expect(TokenKind::RParen)?;
                Ok(ProjectionItem::Count)
            }
            TokenKind::DP_COUNT => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                self.expect(TokenKind::Star)?;
                self.expect(TokenKind::RParen)?;
                Ok(ProjectionItem::DpCount)
            }
            TokenKind::SUM | TokenKind::AVG | TokenKind::MIN | TokenKind::MAX => {
                let kind = self.advance().kind;
                self.expect(TokenKind::LParen)?;
                let col = self.parse_column_ref()?;
                self.expect(TokenKind::RParen)?;
                Ok(match kind {
                    TokenKind::SUM => ProjectionItem::Sum(col),
                    TokenKind::AVG => ProjectionItem::Avg(col),
                    TokenKind::MIN => ProjectionItem::Min(col),
                    _ => ProjectionItem::Max(col),
                })
            }
            _ => Ok(ProjectionItem::Column(self.parse_column_ref()?)),
        }
    }

    fn parse_column_ref(&mut self) -> PResult<ColumnRef> {
        let first = self.ident()?;
        if self.eat(TokenKind::Period) {
            let name = self.ident()?;
            Ok(ColumnRef::qualified(first, name))
        } else {
            Ok(ColumnRef::unqualified(first))
        }
    }

    // ---- WHERE (conjunction only, §4.4) ----

    fn parse_optional_where(&mut self) -> PResult<Vec<Condition>> {
        if !self.eat(TokenKind::WHERE) {
            return Ok(Vec::new());
        }
        let mut conditions = vec![self.parse_condition()?];
        while self.eat(TokenKind::AND) {
            conditions.push(self.parse_condition()?);
        }
        Ok(conditions)
    }

    fn parse_condition(&mut self) -> PResult<Condition> {
        if self.eat(TokenKind::DISTANCE) {
            self.expect(TokenKind::LParen)?;
            let column = self.parse_column_ref()?;
            self.expect(TokenKind::Comma)?;
            let vector = self.parse_vector_literal()?;
            self.expect(TokenKind::RParen)?;
            let op = self.advance().kind;
            if op != TokenKind::Lt {
                return Err("DISTANCE predicate only supports '<'".to_string());
            }
            let threshold = self.literal_f64()?;
            return Ok(Condition::Distance { column, vector, threshold });
        }

        let column = self.parse_column_ref()?;

        if self.eat(TokenKind::IS) {
            if self.eat(TokenKind::NOT) {
                self.expect(TokenKind::NULL)?;
                return Ok(Condition::IsNotNull { column });
            }
            self.expect(TokenKind::NULL)?;
            return Ok(Condition::IsNull { column });
        }

        let op = match self.advance().kind {
            TokenKind::Eq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::Ne,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::Lte => CmpOp::Le,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::Gte => CmpOp::Ge,
            other => return Err(format!("expected comparison operator, found {:?}", other)),
        };
        let value = self.parse_value_literal()?;
        Ok(Condition::Compare { column, op, value })
    }

    // ---- SET / SAVE / LOAD ----

    fn parse_set(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::SET)?;
        let key = match self.advance().kind {
            TokenKind::DP_EPSILON => "DP_EPSILON".to_string(),
            _ => return Err("only SET DP_EPSILON is supported".to_string()),
        };
        self.expect(TokenKind::Eq)?;
        let value = self.literal_f64()?;
        Ok(Statement::Set(SetStmt { key, value }))
    }

    fn parse_save(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::SAVE)?;
        self.expect(TokenKind::DATABASE)?;
        let path = self.quoted_string()?;
        Ok(Statement::Save(SaveStmt { path }))
    }

    fn parse_load(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::LOAD)?;
        self.expect(TokenKind::DATABASE)?;
        let path = self.quoted_string()?;
        Ok(Statement::Load(LoadStmt { path }))
    }

    // ---- literals ----

    fn parse_value_literal(&mut self) -> PResult<Value> {
        match self.peek_kind() {
            TokenKind::NULL => {
                self.advance();
                Ok(Value::Null)
            }
            TokenKind::QuotedString => Ok(Value::Text(self.quoted_string()?)),
            TokenKind::Minus | TokenKind::LiteralInteger | TokenKind::LiteralFloat => self.parse_number(),
            TokenKind::LBrace => self.parse_set_literal(),
            TokenKind::LBracket => self.parse_vector_literal().map(Value::Vector),
            other => Err(format!("expected a value literal, found {:?} ('{}')", other, self.peek().slice)),
        }
    }

    fn parse_number(&mut self) -> PResult<Value> {
        let negative = self.eat(TokenKind::Minus);
        match self.peek_kind() {
            TokenKind::LiteralInteger => {
                let text = self.advance().slice;
                let n: i64 = text.parse().map_err(|_| format!("bad integer literal '{}'", text))?;
                Ok(Value::Int(if negative { -n } else { n }))
            }
            TokenKind::LiteralFloat => {
                let text = self.advance().slice;
                let n: f64 = text.parse().map_err(|_| format!("bad float literal '{}'", text))?;
                Ok(Value::Double(if negative { -n } else { n }))
            }
            other => Err(format!("expected a number, found {:?}", other)),
        }
    }

    fn parse_set_literal(&mut self) -> PResult<Value> {
        self.expect(TokenKind::LBrace)?;
        let mut set = BTreeSet::new();
        if self.peek_kind() != TokenKind::RBrace {
            loop {
                set.insert(self.quoted_string()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Value::SetText(set))
    }

    fn parse_vector_literal(&mut self) -> PResult<Vec<f64>> {
        self.expect(TokenKind::LBracket)?;
        let mut values = Vec::new();
        if self.peek_kind() != TokenKind::RBracket {
            loop {
                values.push(self.literal_f64()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(values)
    }

    fn quoted_string(&mut self) -> PResult<String> {
        let tok = self.expect(TokenKind::QuotedString)?;
        let inner = &tok.slice[1..tok.slice.len() - 1];
        Ok(unescape_sql_string(inner))
    }

    fn literal_i64(&mut self) -> PResult<i64> {
        let negative = self.eat(TokenKind::Minus);
        let tok = self.expect(TokenKind::LiteralInteger)?;
        let n: i64 = tok.slice.parse().map_err(|_| format!("bad integer literal '{}'", tok.slice))?;
        Ok(if negative { -n } else { n })
    }

    fn literal_usize(&mut self) -> PResult<usize> {
        let tok = self.expect(TokenKind::LiteralInteger)?;
        tok.slice.parse().map_err(|_| format!("bad unsigned integer literal '{}'", tok.slice))
    }

    fn literal_f64(&mut self) -> PResult<f64> {
        let negative = self.eat(TokenKind::Minus);
        let n = match self.peek_kind() {
            TokenKind::LiteralInteger | TokenKind::LiteralFloat => {
                self.advance().slice.parse::<f64>().map_err(|_| "bad numeric literal".to_string())?
            }
            other => return Err(format!("expected a number, found {:?}", other)),
        };
        Ok(if negative { -n } else { n })
    }
}

/// Unescapes a single-quoted SQL string body: `\'` and `\\` collapse to
/// their literal character, any other escape is left as-is.
fn unescape_sql_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_create_table_with_primary_key_and_merge() {
        let stmt = parse("CREATE TABLE c(id TEXT PRIMARY KEY, n INT MERGE SUM_BOUNDED(0,100))");
        match stmt {
            Statement::Create(c) => {
                assert_eq!(c.table, "c");
                assert_eq!(c.columns.len(), 2);
                assert!(c.columns[0].primary_key);
                assert_eq!(c.columns[1].merge, MergeSpec::SumBounded(0, 100));
            }
            other => panic!("expected Create, got {:?}", other),
        }
    }

    #[test]
    fn parses_insert_with_on_conflict_merge() {
        let stmt = parse("INSERT INTO c(id,n) VALUES ('k', 30) ON CONFLICT MERGE");
        match stmt {
            Statement::Insert(i) => {
                assert!(i.on_conflict_merge);
                assert_eq!(i.rows, vec![vec![Value::Text("k".to_string()), Value::Int(30)]]);
            }
            other => panic!("expected Insert, got {:?}", other),
        }
    }

    #[test]
    fn parses_select_with_system_time_and_where() {
        let stmt = parse("SELECT v FROM t FOR SYSTEM_TIME AS OF TX 1 WHERE id = 1");
        match stmt {
            Statement::Select(s) => {
                assert_eq!(s.as_of_tx, Some(1));
                assert_eq!(s.where_clause.len(), 1);
            }
            other => panic!("expected Select, got {:?}", other),
        }
    }

    #[test]
    fn parses_distance_predicate() {
        let stmt = parse("SELECT id FROM e WHERE DISTANCE(emb,[0,0,0]) < 1.5");
        match stmt {
            Statement::Select(s) => {
                assert_eq!(
                    s.where_clause[0],
                    Condition::Distance {
                        column: ColumnRef::unqualified("emb"),
                        vector: vec![0.0, 0.0, 0.0],
                        threshold: 1.5
                    }
                );
            }
            other => panic!("expected Select, got {:?}", other),
        }
    }

    #[test]
    fn parses_join_group_by_order_by() {
        let stmt = parse(
            "SELECT region, SUM(amt) FROM u JOIN o ON u.id = o.uid GROUP BY region ORDER BY region",
        );
        match stmt {
            Statement::Select(s) => {
                assert!(s.join.is_some());
                assert_eq!(s.group_by, vec!["region".to_string()]);
                assert_eq!(s.order_by, Some(OrderBy { column: "region".to_string(), descending: false }));
            }
            other => panic!("expected Select, got {:?}", other),
        }
    }

    #[test]
    fn unsupported_statement_is_invalid_not_a_panic() {
        let stmt = parse("GRANT ALL ON t TO bob");
        assert!(matches!(stmt, Statement::Invalid(_)));
    }

    #[test]
    fn parses_vector_and_set_literals() {
        let stmt = parse("INSERT INTO e(id,emb) VALUES (1,[0,0,0])");
        match stmt {
            Statement::Insert(i) => assert_eq!(i.rows[0][1], Value::Vector(vec![0.0, 0.0, 0.0])),
            other => panic!("expected Insert, got {:?}", other),
        }

        let stmt2 = parse("INSERT INTO s(id,tags) VALUES ('x', {'a','b'})");
        match stmt2 {
            Statement::Insert(i) => {
                let mut expect = BTreeSet::new();
                expect.insert("a".to_string());
                expect.insert("b".to_string());
                assert_eq!(i.rows[0][1], Value::SetText(expect));
            }
            other => panic!("expected Insert, got {:?}", other),
        }
    }
}
