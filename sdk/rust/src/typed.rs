//! Strongly typed operations and responses.
//!
//! Generated code implements [`TypedOperation`] once per operation and
//! [`OperationVariables`] for its variables struct.

use tgql_core::{Error, ErrorCode, OptionalValue, Result};
use tgql_runtime::{DocumentRef, GraphQLError, OperationDefinition, OperationKind, Variable};

/// A strongly typed GraphQL operation.
///
/// # Example
///
/// ```
/// use tgql_core::{OptionalValue, Result};
/// use tgql_runtime::{OperationKind, Variable};
/// use tgql_sdk::typed::{require_non_null, OperationVariables, TypedOperation};
///
/// struct HeroVariables {
///     episode: OptionalValue<String>,
/// }
///
/// impl OperationVariables for HeroVariables {
///     fn validate(&self) -> Result<()> {
///         require_non_null("episode", &self.episode)
///     }
///
///     fn into_variables(self) -> Vec<Variable> {
///         vec![Variable::new("episode", "Episode!", self.episode)]
///     }
/// }
///
/// struct Hero {
///     name: String,
/// }
///
/// struct HeroQuery;
///
/// impl TypedOperation for HeroQuery {
///     type Variables = HeroVariables;
///     type Result = Hero;
///
///     const OPERATION_NAME: &'static str = "Hero";
///     const DOCUMENT: &'static str = "hero";
///     const KIND: OperationKind = OperationKind::Query;
/// }
///
/// let definition = HeroQuery::definition(HeroVariables {
///     episode: OptionalValue::set("JEDI".to_string()),
/// });
/// assert_eq!(definition.name(), "Hero");
/// assert_eq!(definition.variables().len(), 1);
/// ```
pub trait TypedOperation {
    /// The input variables type.
    type Variables: OperationVariables;

    /// The typed result.
    type Result: Send + 'static;

    /// The operation name.
    const OPERATION_NAME: &'static str;

    /// Key of the operation's document in the document store.
    const DOCUMENT: &'static str;

    /// The kind of operation.
    const KIND: OperationKind;

    /// Builds the definition for one call. Does not validate.
    fn definition(variables: Self::Variables) -> OperationDefinition {
        OperationDefinition::new::<Self::Result>(
            Self::OPERATION_NAME,
            DocumentRef::new(Self::DOCUMENT),
            variables.into_variables(),
        )
        .with_kind(Self::KIND)
    }
}

/// The variables of one operation.
pub trait OperationVariables: Send {
    /// Checks call-site constraints before anything is sent.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Lists every declared variable in declaration order.
    fn into_variables(self) -> Vec<Variable>;
}

/// Variables of an operation that declares none.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariables;

impl OperationVariables for NoVariables {
    fn into_variables(self) -> Vec<Variable> {
        Vec::new()
    }
}

/// Fails with an argument error if `value` is an explicit null.
///
/// `Unset` passes; leaving a required argument out is for the server to
/// reject.
pub fn require_non_null<T>(argument: &str, value: &OptionalValue<T>) -> Result<()> {
    if value.is_null() {
        return Err(Error::argument(format!("Argument `{argument}` must not be null")));
    }
    Ok(())
}

/// A typed GraphQL response.
#[derive(Debug)]
pub struct OperationResponse<T> {
    /// The typed result, when `data` parsed.
    pub data: Option<T>,
    /// Application errors reported by the server.
    pub errors: Vec<GraphQLError>,
    /// Why `data` could not be turned into `T`, if it could not.
    pub data_error: Option<Error>,
}

impl<T> OperationResponse<T> {
    /// Returns true if the response has application errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if both a result and application errors are present.
    pub fn is_partial(&self) -> bool {
        self.data.is_some() && self.has_errors()
    }

    /// Returns the data if present and no errors occurred.
    pub fn into_result(self) -> Result<T> {
        if let Some(error) = self.errors.first() {
            return Err(Error::new(ErrorCode::ExecutionError, error.message.clone()));
        }
        if let Some(error) = self.data_error {
            return Err(error);
        }
        self.data
            .ok_or_else(|| Error::new(ErrorCode::NoData, "No data in response"))
    }
}
