//! Registry of scalar functions and aggregates.
//!
//! Functions are keyed by name and ordered argument types, so one name may
//! carry several overloads. The registry is an explicit value handed to the
//! planner and executor; there is no process-wide instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, VexecError};
use crate::types::DataType;
use crate::udf::{
    Accumulator, AggregateSignature, ScalarSignature, ScalarUdf, ScalarUdfExecutor,
    ScalarUdfWrapper, Uda, UdaWrapper,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FunctionKey {
    name: String,
    arg_types: Vec<DataType>,
}

impl FunctionKey {
    fn new(name: &str, arg_types: &[DataType]) -> Self {
        FunctionKey {
            name: name.to_string(),
            arg_types: arg_types.to_vec(),
        }
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        crate::udf::scalar::write_arg_types(f, &self.arg_types)
    }
}

/// A registered scalar function overload.
#[derive(Debug)]
pub struct ScalarUdfDefinition {
    name: String,
    signature: ScalarSignature,
    make: fn() -> Box<dyn ScalarUdfExecutor>,
}

impl ScalarUdfDefinition {
    /// Returns the registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the signature.
    #[must_use]
    pub fn signature(&self) -> &ScalarSignature {
        &self.signature
    }

    /// Creates a new executor for this function.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn ScalarUdfExecutor> {
        (self.make)()
    }
}

/// A registered aggregate overload.
#[derive(Debug)]
pub struct UdaDefinition {
    name: String,
    signature: AggregateSignature,
    make: fn() -> Box<dyn Accumulator>,
}

impl UdaDefinition {
    /// Returns the registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the signature.
    #[must_use]
    pub fn signature(&self) -> &AggregateSignature {
        &self.signature
    }

    /// Creates a fresh accumulator in its initial state.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Accumulator> {
        (self.make)()
    }
}

fn make_scalar<F: ScalarUdf + Default>() -> Box<dyn ScalarUdfExecutor> {
    Box::new(ScalarUdfWrapper::new(F::default()))
}

fn make_uda<U: Uda + Default>() -> Box<dyn Accumulator> {
    Box::new(UdaWrapper::new(U::default()))
}

/// Named collection of function definitions.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    name: String,
    scalars: HashMap<FunctionKey, Arc<ScalarUdfDefinition>>,
    udas: HashMap<FunctionKey, Arc<UdaDefinition>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        FunctionRegistry {
            name: name.into(),
            scalars: HashMap::new(),
            udas: HashMap::new(),
        }
    }

    /// Returns the registry's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a scalar function under `name`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateFunction` if `name` already has a scalar overload
    /// with the same argument types.
    pub fn register_scalar<F: ScalarUdf + Default>(&mut self, name: &str) -> Result<()> {
        let signature = ScalarSignature::of::<F>();
        let key = FunctionKey::new(name, &signature.arg_types);
        if self.scalars.contains_key(&key) {
            return Err(VexecError::DuplicateFunction(key.to_string()));
        }
        debug!(registry = %self.name, function = %key, "registered scalar function");
        self.scalars.insert(
            key,
            Arc::new(ScalarUdfDefinition {
                name: name.to_string(),
                signature,
                make: make_scalar::<F>,
            }),
        );
        Ok(())
    }

    /// Registers an aggregate under `name`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateFunction` if `name` already has an aggregate
    /// overload with the same argument types.
    pub fn register_uda<U: Uda + Default>(&mut self, name: &str) -> Result<()> {
        let signature = AggregateSignature::of::<U>();
        let key = FunctionKey::new(name, &signature.update_arg_types);
        if self.udas.contains_key(&key) {
            return Err(VexecError::DuplicateFunction(key.to_string()));
        }
        debug!(registry = %self.name, function = %key, "registered aggregate");
        self.udas.insert(
            key,
            Arc::new(UdaDefinition {
                name: name.to_string(),
                signature,
                make: make_uda::<U>,
            }),
        );
        Ok(())
    }

    /// Resolves a scalar function overload.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFunction` if no scalar function has this name, or
    /// `SignatureMismatch` if none of its overloads takes `arg_types`.
    pub fn scalar(&self, name: &str, arg_types: &[DataType]) -> Result<Arc<ScalarUdfDefinition>> {
        let key = FunctionKey::new(name, arg_types);
        if let Some(def) = self.scalars.get(&key) {
            return Ok(Arc::clone(def));
        }
        Err(mismatch(&key, self.scalars.keys()))
    }

    /// Resolves an aggregate overload.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFunction` if no aggregate has this name, or
    /// `SignatureMismatch` if none of its overloads takes `arg_types`.
    pub fn uda(&self, name: &str, arg_types: &[DataType]) -> Result<Arc<UdaDefinition>> {
        let key = FunctionKey::new(name, arg_types);
        if let Some(def) = self.udas.get(&key) {
            return Ok(Arc::clone(def));
        }
        Err(mismatch(&key, self.udas.keys()))
    }

    /// Returns true if a scalar function or aggregate has this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.scalars.keys().chain(self.udas.keys()).any(|k| k.name == name)
    }

    /// Returns the number of registered overloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scalars.len() + self.udas.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn mismatch<'a>(key: &FunctionKey, keys: impl Iterator<Item = &'a FunctionKey>) -> VexecError {
    let mut candidates: Vec<String> = keys
        .filter(|k| k.name == key.name)
        .map(ToString::to_string)
        .collect();
    if candidates.is_empty() {
        return VexecError::UnknownFunction(key.name.clone());
    }
    candidates.sort();
    VexecError::SignatureMismatch(format!(
        "no overload {key}; candidates: {}",
        candidates.join(", ")
    ))
}
