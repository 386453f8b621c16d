//! Plan descriptions consumed by execution nodes.
//!
//! These are plain data produced by a planner. Nodes validate them against
//! the function registry and row descriptors at init time.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VexecError};
use crate::types::Value;

/// Reference to a column of a node's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Id of the producing node.
    pub node: i64,
    /// Column index within that node's output.
    pub index: usize,
}

impl ColumnRef {
    /// Creates a reference to column `index` of `node`'s output.
    #[must_use]
    pub fn new(node: i64, index: usize) -> Self {
        ColumnRef { node, index }
    }
}

/// An argument of an aggregate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateArg {
    /// Input column.
    Column(ColumnRef),
    /// Constant broadcast to every row.
    Literal(Value),
}

/// An aggregate call: function name plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateExpression {
    /// Registered aggregate name.
    pub name: String,
    /// Ordered arguments.
    pub args: Vec<AggregateArg>,
}

impl AggregateExpression {
    /// Creates an aggregate call.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<AggregateArg>) -> Self {
        AggregateExpression {
            name: name.into(),
            args,
        }
    }
}

/// Blocking aggregation: consume every input batch, then emit one batch of
/// group keys followed by aggregate results.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockingAggregateOperator {
    /// Aggregate calls, one output column each.
    pub values: Vec<AggregateExpression>,
    /// Grouping columns; empty for a single global group.
    pub groups: Vec<ColumnRef>,
    /// Output names of the grouping columns.
    pub group_names: Vec<String>,
    /// Output names of the aggregate columns.
    pub value_names: Vec<String>,
}

impl BlockingAggregateOperator {
    /// Creates an ungrouped aggregation.
    #[must_use]
    pub fn new(values: Vec<AggregateExpression>, value_names: Vec<String>) -> Self {
        BlockingAggregateOperator {
            values,
            groups: Vec::new(),
            group_names: Vec::new(),
            value_names,
        }
    }

    /// Sets the grouping columns.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<ColumnRef>, group_names: Vec<String>) -> Self {
        self.groups = groups;
        self.group_names = group_names;
        self
    }

    /// Returns the output column names: group names, then value names.
    #[must_use]
    pub fn output_names(&self) -> Vec<String> {
        self.group_names
            .iter()
            .chain(&self.value_names)
            .cloned()
            .collect()
    }

    /// Checks that every column has a name.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` if a name list and its column list differ in length.
    pub fn validate(&self) -> Result<()> {
        if self.groups.len() != self.group_names.len() {
            return Err(VexecError::PlanError(format!(
                "{} groups but {} group names",
                self.groups.len(),
                self.group_names.len()
            )));
        }
        if self.values.len() != self.value_names.len() {
            return Err(VexecError::PlanError(format!(
                "{} values but {} value names",
                self.values.len(),
                self.value_names.len()
            )));
        }
        Ok(())
    }
}

/// A projection expression evaluated per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapExpression {
    /// Input column, passed through.
    Column(ColumnRef),
    /// Constant broadcast to every row.
    Literal(Value),
    /// Scalar function call over nested expressions.
    Call {
        /// Registered scalar function name.
        name: String,
        /// Ordered arguments.
        args: Vec<MapExpression>,
    },
}

impl MapExpression {
    /// Creates a scalar function call.
    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<MapExpression>) -> Self {
        MapExpression::Call {
            name: name.into(),
            args,
        }
    }
}

/// Projection: evaluate one expression per output column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapOperator {
    /// Expressions, one output column each.
    pub expressions: Vec<MapExpression>,
    /// Output column names.
    pub column_names: Vec<String>,
}

impl MapOperator {
    /// Creates a projection.
    #[must_use]
    pub fn new(expressions: Vec<MapExpression>, column_names: Vec<String>) -> Self {
        MapOperator {
            expressions,
            column_names,
        }
    }

    /// Checks that every column has a name.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` if the name count differs from the expression count.
    pub fn validate(&self) -> Result<()> {
        if self.expressions.len() != self.column_names.len() {
            return Err(VexecError::PlanError(format!(
                "{} expressions but {} column names",
                self.expressions.len(),
                self.column_names.len()
            )));
        }
        Ok(())
    }
}
