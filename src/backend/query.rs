//! Filtros y consultas sobre tablas del backend
//!
//! Se traducen a parámetros PostgREST (`columna=op.valor`) para el cliente HTTP
//! y se evalúan en proceso para el backend en memoria.

use serde_json::Value;

/// Condición sobre una columna
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String),
    Neq(String),
    In(Vec<String>),
    IsNull,
}

/// Conjunto de condiciones (AND)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.conditions.push((column.to_string(), Condition::Eq(value.to_string())));
        self
    }

    pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
        self.conditions.push((column.to_string(), Condition::Neq(value.to_string())));
        self
    }

    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.conditions.push((column.to_string(), Condition::In(values)));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.conditions.push((column.to_string(), Condition::IsNull));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }

    /// Parámetros PostgREST sin codificar
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.conditions
            .iter()
            .map(|(column, condition)| {
                let value = match condition {
                    Condition::Eq(v) => format!("eq.{}", v),
                    Condition::Neq(v) => format!("neq.{}", v),
                    Condition::In(values) => {
                        let quoted: Vec<String> = values.iter().map(|v| quote_in_value(v)).collect();
                        format!("in.({})", quoted.join(","))
                    }
                    Condition::IsNull => "is.null".to_string(),
                };
                (column.clone(), value)
            })
            .collect()
    }

    /// Evaluar el filtro contra una fila JSON
    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|(column, condition)| {
            let cell = row.get(column).unwrap_or(&Value::Null);
            match condition {
                Condition::Eq(expected) => cell_as_string(cell).as_deref() == Some(expected.as_str()),
                Condition::Neq(expected) => cell_as_string(cell).as_deref() != Some(expected.as_str()),
                Condition::In(values) => cell_as_string(cell).map_or(false, |c| values.contains(&c)),
                Condition::IsNull => cell.is_null(),
            }
        })
    }
}

fn quote_in_value(value: &str) -> String {
    if value.contains(',') || value.contains('(') || value.contains(')') {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn cell_as_string(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Orden de resultados
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Consulta de lectura
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parámetros PostgREST de la consulta completa
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(self.filter.to_query_pairs());
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

/// Codificar pares como query string
pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
