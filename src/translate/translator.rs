use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace};

use super::monad::{
    BoolMonad, Comparison, Extractor, Monad, NumericMonad, ObjectMonad, ObjectSource, Param,
    Scalar, TextMonad,
};
use super::types::SemanticType;
use crate::ast::{
    sql_and, BinaryOperator, Expression, Literal, OrderByExpr, SelectQuery, TableRef,
};
use crate::error::{Error, Result};
use crate::expr::{walk, ArithOp, CmpOp, Comprehension, Constant, Expr, Target, Visitor};
use crate::schema::{EntityType, Projection};
use crate::value::Value;

/// Prefix reserved for generated names.
const RESERVED_PREFIX: &str = "__";

/// FROM sources and WHERE conditions accumulated during translation.
///
/// Implicit joins are keyed by their alias path (`p-address`), so the
/// same relationship walked twice shares one join.
#[derive(Debug, Clone, Default)]
pub struct JoinScope {
    aliases: BTreeMap<String, EntityType>,
    from: Vec<TableRef>,
    conditions: Vec<Expression>,
}

impl JoinScope {
    pub fn aliases(&self) -> &BTreeMap<String, EntityType> {
        &self.aliases
    }

    pub fn from(&self) -> &[TableRef] {
        &self.from
    }

    pub fn conditions(&self) -> &[Expression] {
        &self.conditions
    }

    fn bind(&mut self, alias: &str, entity: &EntityType) {
        self.aliases.insert(alias.to_string(), entity.clone());
        self.from.push(TableRef {
            name: entity.table().to_string(),
            alias: alias.to_string(),
        });
    }

    /// Alias of the table `target` reached from `base_alias` through
    /// `fk_columns`, joining it on first use.
    pub fn ensure_join(
        &mut self,
        path: &str,
        base_alias: &str,
        fk_columns: &[String],
        target: &EntityType,
    ) -> String {
        if !self.aliases.contains_key(path) {
            debug!(alias = path, table = target.table(), "implicit join");
            self.bind(path, target);
            for (fk, pk) in fk_columns.iter().zip(target.pk_columns()) {
                self.conditions.push(Expression::binary(
                    Expression::column(base_alias, fk.as_str()),
                    BinaryOperator::Eq,
                    Expression::column(path, pk),
                ));
            }
        }
        path.to_string()
    }

    fn where_clause(&self) -> Option<Expression> {
        if self.conditions.is_empty() {
            None
        } else {
            Some(sql_and(self.conditions.clone()))
        }
    }
}

/// One ORDER BY key: a dotted attribute path on the result entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub path: Vec<String>,
    pub asc: bool,
}

impl OrderKey {
    pub fn asc(path: &str) -> Self {
        Self {
            path: path.split('.').map(String::from).collect(),
            asc: true,
        }
    }

    pub fn desc(path: &str) -> Self {
        Self {
            asc: false,
            ..Self::asc(path)
        }
    }
}

impl From<&str> for OrderKey {
    fn from(path: &str) -> Self {
        OrderKey::asc(path)
    }
}

/// Compiled plan for one comprehension shape and variable signature.
#[derive(Debug)]
pub struct Translator {
    entity: EntityType,
    alias: String,
    scope: JoinScope,
    extractors: BTreeMap<String, Extractor>,
    projection: Projection,
    sql_ast: SelectQuery,
}

impl Translator {
    pub fn new(query: &Comprehension, vartypes: &BTreeMap<String, SemanticType>) -> Result<Self> {
        let mut ctx = Context {
            vartypes,
            iterables: BTreeMap::new(),
            diagram: None,
            scope: JoinScope::default(),
            extractors: BTreeMap::new(),
        };

        if !query.unscoped.is_empty() {
            return Err(Error::translation(format!(
                "{} condition(s) given before the first loop",
                query.unscoped.len()
            )));
        }

        for qualifier in &query.qualifiers {
            let name = match &qualifier.target {
                Target::Name(name) => name,
                Target::Tuple(_) => {
                    return Err(Error::translation("tuple targets are not supported"))
                }
            };
            if name.starts_with(RESERVED_PREFIX) {
                return Err(Error::translation(format!(
                    "loop variable {} uses the reserved prefix {}",
                    name, RESERVED_PREFIX
                )));
            }
            if ctx.iterables.contains_key(name) {
                return Err(Error::translation(format!(
                    "duplicate loop variable {}",
                    name
                )));
            }
            let entity = match &qualifier.iter {
                Expr::Name(source) => match vartypes.get(source) {
                    Some(SemanticType::Entities(entity)) => entity.clone(),
                    Some(other) => {
                        return Err(Error::type_error(format!(
                            "cannot iterate over {} ({})",
                            source, other
                        )))
                    }
                    None => return Err(Error::Name(source.clone())),
                },
                _ => {
                    return Err(Error::not_implemented(
                        "loop source must be an entity name",
                    ))
                }
            };
            ctx.check_diagram(&entity)?;
            ctx.iterables.insert(name.clone(), entity.clone());
            ctx.scope.bind(name, &entity);

            for filter in &qualifier.filters {
                let cond = ctx.translate(filter)?.into_bool()?;
                let expr = cond.expression()?;
                ctx.scope.conditions.push(expr);
            }
        }

        let (entity, alias) = match ctx.translate(&query.result)? {
            Monad::Object(ObjectMonad {
                entity,
                source: ObjectSource::Iter { alias },
            }) => (entity, alias),
            Monad::Object(ObjectMonad {
                entity,
                source:
                    ObjectSource::Attr {
                        alias,
                        columns,
                        path,
                    },
            }) => {
                let joined = ctx.scope.ensure_join(&path, &alias, &columns, &entity);
                (entity, joined)
            }
            other => {
                return Err(Error::type_error(format!(
                    "query result must be an entity, got {}",
                    other.semantic_type()
                )))
            }
        };

        let projection = entity.projection(&alias);

        let mut used = BTreeSet::new();
        for cond in &ctx.scope.conditions {
            collect_params(cond, &mut used);
        }
        let extractors: BTreeMap<String, Extractor> = ctx
            .extractors
            .into_iter()
            .filter(|(name, _)| used.contains(name))
            .collect();

        let sql_ast = SelectQuery {
            projections: projection.columns.clone(),
            from: ctx.scope.from.clone(),
            filter: ctx.scope.where_clause(),
            ..Default::default()
        };
        debug!(
            entity = entity.name(),
            tables = sql_ast.from.len(),
            params = extractors.len(),
            "translated query"
        );

        Ok(Self {
            entity,
            alias,
            scope: ctx.scope,
            extractors,
            projection,
            sql_ast,
        })
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    /// Table alias of the result entity.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn scope(&self) -> &JoinScope {
        &self.scope
    }

    pub fn extractors(&self) -> &BTreeMap<String, Extractor> {
        &self.extractors
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// SELECT / FROM / WHERE without ordering or limits.
    pub fn sql_ast(&self) -> &SelectQuery {
        &self.sql_ast
    }

    /// Full statement for one ordering and row range.
    pub fn statement(&self, order: &[OrderKey], limit: Option<(usize, usize)>) -> Result<SelectQuery> {
        let mut select = self.sql_ast.clone();
        if !order.is_empty() {
            let mut scope = self.scope.clone();
            for key in order {
                for expr in self.order_columns(&mut scope, key)? {
                    select.order_by.push(OrderByExpr { expr, asc: key.asc });
                }
            }
            if scope.from.len() != self.scope.from.len() {
                select.from = scope.from.clone();
                select.filter = scope.where_clause();
            }
        }
        if let Some((start, stop)) = limit {
            select.limit = Some(Expression::Literal(Literal::Integer(to_i64(stop - start)?)));
            select.offset = Some(Expression::Literal(Literal::Integer(to_i64(start)?)));
        }
        Ok(select)
    }

    /// Check that `key` names an orderable attribute path of the result.
    pub fn check_order(&self, key: &OrderKey) -> Result<()> {
        let mut scope = self.scope.clone();
        self.order_columns(&mut scope, key).map(|_| ())
    }

    /// Order keys may only add joins through required references: a new
    /// inner join on an optional one would drop rows whose reference is
    /// None. Joins already made by the filters are reused freely.
    fn order_columns(&self, scope: &mut JoinScope, key: &OrderKey) -> Result<Vec<Expression>> {
        let mut monad = Monad::Object(ObjectMonad::iter(self.entity.clone(), &self.alias));
        let mut optional: Option<&str> = None;
        for attr in &key.path {
            let joins = scope.from.len();
            let next = monad.attribute(attr, scope)?;
            if let Some(reference) = optional.filter(|_| scope.from.len() > joins) {
                return Err(Error::type_error(format!(
                    "cannot order by {}: {} is optional and not joined by the query",
                    key.path.join("."),
                    reference
                )));
            }
            optional = match &monad {
                Monad::Object(obj) => obj
                    .entity
                    .attr(attr)
                    .filter(|a| !a.required)
                    .map(|_| attr.as_str()),
                _ => None,
            };
            monad = next;
        }
        monad.order_columns()
    }

    /// Current parameter values, keyed by placeholder name.
    pub fn extract(&self, values: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
        let mut params = HashMap::with_capacity(self.extractors.len());
        for (name, extractor) in &self.extractors {
            let value = extractor.extract(values)?;
            trace!(param = name.as_str(), ?value, "extracted parameter");
            params.insert(name.clone(), value);
        }
        Ok(params)
    }
}

fn to_i64(n: usize) -> Result<i64> {
    i64::try_from(n).map_err(|_| Error::type_error(format!("row bound {} is too large", n)))
}

fn collect_params(expr: &Expression, out: &mut BTreeSet<String>) {
    match expr {
        Expression::Parameter(name) => {
            out.insert(name.clone());
        }
        Expression::BinaryOp { left, right, .. } => {
            collect_params(left, out);
            collect_params(right, out);
        }
        Expression::UnaryOp { expr, .. } | Expression::IsNull { expr, .. } => {
            collect_params(expr, out)
        }
        Expression::And(items) | Expression::Or(items) => {
            for item in items {
                collect_params(item, out);
            }
        }
        Expression::InList { expr, list, .. } => {
            collect_params(expr, out);
            for item in list {
                collect_params(item, out);
            }
        }
        Expression::Column { .. } | Expression::Literal(_) => {}
    }
}

struct Context<'a> {
    vartypes: &'a BTreeMap<String, SemanticType>,
    iterables: BTreeMap<String, EntityType>,
    diagram: Option<u64>,
    scope: JoinScope,
    extractors: BTreeMap<String, Extractor>,
}

impl Context<'_> {
    fn check_diagram(&mut self, entity: &EntityType) -> Result<()> {
        let id = entity.diagram().id();
        match self.diagram {
            None => {
                self.diagram = Some(id);
                Ok(())
            }
            Some(current) if current == id => Ok(()),
            Some(_) => Err(Error::translation(format!(
                "{} belongs to diagram {}, which is not the diagram of this query",
                entity,
                entity.diagram().name()
            ))),
        }
    }

    fn translate(&mut self, expr: &Expr) -> Result<Monad> {
        let mut walker = Walker {
            ctx: self,
            stack: Vec::new(),
        };
        walk(&mut walker, expr)?;
        let monad = walker.pop()?;
        if !walker.stack.is_empty() {
            return Err(Error::translation("unbalanced expression"));
        }
        Ok(monad)
    }

    fn register(&mut self, monad: &Monad) {
        for (name, extractor) in monad.extractors() {
            self.extractors.insert(name, extractor);
        }
    }
}

/// Post-order evaluation of an expression into a monad stack.
struct Walker<'c, 'a> {
    ctx: &'c mut Context<'a>,
    stack: Vec<Monad>,
}

impl Walker<'_, '_> {
    fn pop(&mut self) -> Result<Monad> {
        self.stack
            .pop()
            .ok_or_else(|| Error::translation("unbalanced expression"))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Monad>> {
        if self.stack.len() < n {
            return Err(Error::translation("unbalanced expression"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn pop_bools(&mut self, n: usize) -> Result<Vec<BoolMonad>> {
        self.pop_n(n)?.into_iter().map(Monad::into_bool).collect()
    }

    fn push(&mut self, monad: Monad) {
        self.ctx.register(&monad);
        self.stack.push(monad);
    }
}

impl Visitor for Walker<'_, '_> {
    type Error = Error;

    fn post_const(&mut self, value: &Constant) -> Result<()> {
        self.push(Monad::constant(value));
        Ok(())
    }

    fn post_name(&mut self, name: &str) -> Result<()> {
        if let Some(entity) = self.ctx.iterables.get(name) {
            let monad = Monad::Object(ObjectMonad::iter(entity.clone(), name));
            self.push(monad);
            return Ok(());
        }
        let monad = match self.ctx.vartypes.get(name) {
            None => return Err(Error::Name(name.to_string())),
            Some(SemanticType::None) => Monad::None,
            Some(SemanticType::Numeric) => {
                Monad::Numeric(NumericMonad(Scalar::Param(Param::root(name))))
            }
            Some(SemanticType::Text) => Monad::Text(TextMonad(Scalar::Param(Param::root(name)))),
            Some(SemanticType::Entity(entity)) => {
                self.ctx.check_diagram(entity)?;
                Monad::Object(ObjectMonad {
                    entity: entity.clone(),
                    source: ObjectSource::Param(Param::root(name)),
                })
            }
            Some(other) => {
                return Err(Error::type_error(format!(
                    "{} ({}) cannot be used as a value",
                    name, other
                )))
            }
        };
        self.push(monad);
        Ok(())
    }

    fn post_attr(&mut self, name: &str) -> Result<()> {
        let owner = self.pop()?;
        let monad = owner.attribute(name, &mut self.ctx.scope)?;
        self.push(monad);
        Ok(())
    }

    fn post_tuple(&mut self, len: usize) -> Result<()> {
        let items = self.pop_n(len)?;
        self.stack.push(Monad::List(items));
        Ok(())
    }

    fn post_binary(&mut self, op: ArithOp) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        self.stack.push(left.arith(op, right)?);
        Ok(())
    }

    fn post_neg(&mut self) -> Result<()> {
        let operand = self.pop()?;
        self.stack.push(operand.negate()?);
        Ok(())
    }

    fn pre_compare(&mut self, ops: &[(CmpOp, Expr)]) -> Result<()> {
        if ops.len() != 1 {
            return Err(Error::not_implemented(format!(
                "chained comparison with {} operators",
                ops.len()
            )));
        }
        Ok(())
    }

    fn post_compare(&mut self, ops: &[(CmpOp, Expr)]) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        let cmp = Comparison::new(ops[0].0, left, right)?;
        self.stack.push(Monad::Bool(BoolMonad::Cmp(cmp)));
        Ok(())
    }

    fn post_and(&mut self, len: usize) -> Result<()> {
        let items = self.pop_bools(len)?;
        self.stack.push(Monad::Bool(BoolMonad::And(items)));
        Ok(())
    }

    fn post_or(&mut self, len: usize) -> Result<()> {
        let items = self.pop_bools(len)?;
        self.stack.push(Monad::Bool(BoolMonad::Or(items)));
        Ok(())
    }

    fn post_not(&mut self) -> Result<()> {
        let inner = self.pop()?.into_bool()?;
        self.stack.push(Monad::Bool(BoolMonad::Not(Box::new(inner))));
        Ok(())
    }

    fn pre_call(&mut self, _args: &[Expr]) -> Result<()> {
        Err(Error::not_implemented("function calls"))
    }

    fn pre_query(&mut self, _query: &Comprehension) -> Result<()> {
        Err(Error::not_implemented("nested queries"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{int, name, none, text, tuple};
    use crate::schema::{AttrKind, Diagram, EntityDef};
    use std::sync::Arc;

    fn diagram() -> Arc<Diagram> {
        Diagram::builder("people")
            .entity(
                EntityDef::new("Country")
                    .primary_key("code", AttrKind::Text)
                    .required("name", AttrKind::Text),
            )
            .entity(
                EntityDef::new("Address")
                    .primary_key("id", AttrKind::Int)
                    .required("city", AttrKind::Text)
                    .required("country", AttrKind::Ref("Country".into())),
            )
            .entity(
                EntityDef::new("Person")
                    .primary_key("id", AttrKind::Int)
                    .required("name", AttrKind::Text)
                    .required("age", AttrKind::Int)
                    .optional("address", AttrKind::Ref("Address".into()))
                    .optional("spouse", AttrKind::Ref("Person".into())),
            )
            .build()
            .unwrap()
    }

    fn vartypes(d: &Arc<Diagram>, extra: &[(&str, SemanticType)]) -> BTreeMap<String, SemanticType> {
        let mut types = BTreeMap::new();
        types.insert(
            "Person".to_string(),
            SemanticType::Entities(d.entity("Person").unwrap()),
        );
        for (name, t) in extra {
            types.insert(name.to_string(), t.clone());
        }
        types
    }

    fn people() -> Comprehension {
        Comprehension::new(name("p")).for_in("p", name("Person"))
    }

    #[test]
    fn test_simple_filter() {
        let d = diagram();
        let q = people().filter(name("p").attr("age").gt(int(30)));
        let t = Translator::new(&q, &vartypes(&d, &[])).unwrap();
        assert_eq!(t.alias(), "p");
        assert_eq!(t.sql_ast().from.len(), 1);
        assert_eq!(
            t.sql_ast().filter,
            Some(Expression::binary(
                Expression::column("p", "age"),
                BinaryOperator::Gt,
                Expression::Literal(Literal::Integer(30))
            ))
        );
        assert!(t.extractors().is_empty());
    }

    #[test]
    fn test_parameters_registered() {
        let d = diagram();
        let q = people().filter(name("p").attr("age").ge(name("low")));
        let t = Translator::new(&q, &vartypes(&d, &[("low", SemanticType::Numeric)])).unwrap();
        assert_eq!(t.extractors().keys().collect::<Vec<_>>(), vec!["low"]);
    }

    #[test]
    fn test_entity_parameter_attribute_only_extracts_attribute() {
        let d = diagram();
        let q = people().filter(name("p").attr("age").gt(name("other").attr("age")));
        let other = SemanticType::Entity(d.entity("Person").unwrap());
        let t = Translator::new(&q, &vartypes(&d, &[("other", other)])).unwrap();
        assert_eq!(t.extractors().keys().collect::<Vec<_>>(), vec!["other.age"]);
    }

    #[test]
    fn test_join_reused() {
        let d = diagram();
        let city = || name("p").attr("address").attr("city");
        let q = people().filter(city().equals(text("Oslo")).or(city().equals(text("Bergen"))));
        let t = Translator::new(&q, &vartypes(&d, &[])).unwrap();
        let aliases: Vec<&str> = t.sql_ast().from.iter().map(|f| f.alias.as_str()).collect();
        assert_eq!(aliases, vec!["p", "p-address"]);

        let select = t.statement(&[OrderKey::asc("address.city")], None).unwrap();
        assert_eq!(select.from.len(), 2);
        assert_eq!(
            select.order_by,
            vec![OrderByExpr {
                expr: Expression::column("p-address", "city"),
                asc: true
            }]
        );
    }

    #[test]
    fn test_order_path_adds_join() {
        let d = diagram();
        let q = people().filter(name("p").attr("address").attr("city").equals(text("Oslo")));
        let t = Translator::new(&q, &vartypes(&d, &[])).unwrap();
        let select = t
            .statement(&[OrderKey::desc("address.country.name")], Some((0, 5)))
            .unwrap();
        let aliases: Vec<&str> = select.from.iter().map(|f| f.alias.as_str()).collect();
        assert_eq!(aliases, vec!["p", "p-address", "p-address-country"]);
        assert_eq!(select.limit, Some(Expression::Literal(Literal::Integer(5))));
        assert_eq!(select.offset, Some(Expression::Literal(Literal::Integer(0))));
        assert!(select.filter.is_some());
        // The plan itself is untouched.
        assert_eq!(t.sql_ast().from.len(), 2);
    }

    #[test]
    fn test_order_through_optional_reference_rejected() {
        let d = diagram();
        let t = Translator::new(&people(), &vartypes(&d, &[])).unwrap();
        let key = OrderKey::asc("address.city");
        assert!(matches!(t.check_order(&key), Err(Error::Type(_))));
        assert!(matches!(t.statement(&[key], None), Err(Error::Type(_))));

        // The key column of an optional reference needs no join.
        let select = t.statement(&[OrderKey::asc("address.id")], None).unwrap();
        assert_eq!(select.from.len(), 1);
        assert!(t.check_order(&OrderKey::asc("spouse.age")).is_err());
    }

    #[test]
    fn test_is_none_on_reference() {
        let d = diagram();
        let q = people().filter(name("p").attr("spouse").is(none()));
        let t = Translator::new(&q, &vartypes(&d, &[])).unwrap();
        assert_eq!(
            t.sql_ast().filter,
            Some(Expression::is_null(Expression::column("p", "spouse"), false))
        );
    }

    #[test]
    fn test_result_through_reference() {
        let d = diagram();
        let q = Comprehension::new(name("p").attr("address"))
            .for_in("p", name("Person"))
            .filter(name("p").attr("age").lt(int(18)));
        let t = Translator::new(&q, &vartypes(&d, &[])).unwrap();
        assert_eq!(t.entity().name(), "Address");
        assert_eq!(t.alias(), "p-address");
        assert_eq!(
            t.projection().columns[0],
            Expression::column("p-address", "id")
        );
    }

    #[test]
    fn test_structural_errors() {
        let d = diagram();
        let types = vartypes(&d, &[("n", SemanticType::Numeric)]);

        let dup = people().for_in("p", name("Person"));
        assert!(matches!(Translator::new(&dup, &types), Err(Error::Translation(_))));

        let reserved = Comprehension::new(name("__p")).for_in("__p", name("Person"));
        assert!(matches!(Translator::new(&reserved, &types), Err(Error::Translation(_))));

        let not_entity = Comprehension::new(name("x")).for_in("x", name("n"));
        assert!(matches!(Translator::new(&not_entity, &types), Err(Error::Type(_))));

        let unknown = people().filter(name("p").attr("age").equals(name("missing")));
        assert!(matches!(Translator::new(&unknown, &types), Err(Error::Name(_))));

        let scalar_result = Comprehension::new(name("p").attr("age")).for_in("p", name("Person"));
        assert!(matches!(Translator::new(&scalar_result, &types), Err(Error::Type(_))));
    }

    #[test]
    fn test_cross_diagram_rejected() {
        let d = diagram();
        let other = diagram();
        let types = vartypes(
            &d,
            &[("Other", SemanticType::Entities(other.entity("Person").unwrap()))],
        );
        let q = people().for_in("o", name("Other"));
        assert!(matches!(Translator::new(&q, &types), Err(Error::Translation(_))));
    }

    #[test]
    fn test_unsupported_shapes() {
        let d = diagram();
        let types = vartypes(&d, &[]);

        let chained = people().filter(int(1).lt(name("p").attr("age")).chain(CmpOp::Lt, int(9)));
        assert!(matches!(Translator::new(&chained, &types), Err(Error::NotImplemented(_))));

        let call = people().filter(name("len").call(vec![name("p")]));
        assert!(matches!(Translator::new(&call, &types), Err(Error::NotImplemented(_))));

        let not_bool = people().filter(name("p").attr("age"));
        assert!(matches!(Translator::new(&not_bool, &types), Err(Error::Type(_))));
    }

    #[test]
    fn test_membership_with_parameter_items() {
        let d = diagram();
        let q = people().filter(name("p").attr("age").is_in(tuple(vec![int(1), name("n")])));
        let t = Translator::new(&q, &vartypes(&d, &[("n", SemanticType::Numeric)])).unwrap();
        match &t.sql_ast().filter {
            Some(Expression::InList { list, negated, .. }) => {
                assert!(!negated);
                assert_eq!(list[1], Expression::Parameter("n".into()));
            }
            other => panic!("expected IN list, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_values() {
        let d = diagram();
        let q = people().filter(name("p").attr("name").equals(name("who")));
        let t = Translator::new(&q, &vartypes(&d, &[("who", SemanticType::Text)])).unwrap();
        let mut values = HashMap::new();
        values.insert("who".to_string(), Value::Text("Ann".into()));
        let params = t.extract(&values).unwrap();
        assert_eq!(params.get("who"), Some(&Value::Text("Ann".into())));
    }
}
