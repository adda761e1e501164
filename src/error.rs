use thiserror::Error;

/// Error types for the numfit-rs library.
///
/// Every message is meant to be shown to an end user verbatim, so variants
/// carry the offending column, row or value wherever one exists.
#[derive(Error, Debug)]
pub enum FitError {
    /// Fewer usable points than the operation needs.
    #[error("Not enough data points: {required} required, {got} available")]
    InsufficientPoints { required: usize, got: usize },

    /// A range whose lower end is not below its upper end.
    #[error("Invalid range: minimum {min} must be less than maximum {max}")]
    InvalidRange { min: f64, max: f64 },

    /// No data row falls inside the requested range.
    #[error("No data points in range [{min}, {max}]")]
    RangeEmpty { min: f64, max: f64 },

    /// Integration or interpolation bounds outside the data's x range.
    #[error("Bounds [{lower}, {upper}] lie outside the data range [{data_min}, {data_max}]")]
    BoundsOutOfRange {
        lower: f64,
        upper: f64,
        data_min: f64,
        data_max: f64,
    },

    /// Lower bound not below the upper bound.
    #[error("Invalid bounds: lower bound {lower} must be less than upper bound {upper}")]
    InvalidBounds { lower: f64, upper: f64 },

    /// A referenced column does not exist.
    #[error("Column '{0}' does not exist")]
    EmptySelection(String),

    /// A cell that should hold a number does not.
    #[error("Column '{column}' holds a non-numeric value at row {row}")]
    NonNumeric { column: String, row: usize },

    /// An inconsistent or incomplete configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A weight source value that produces a zero divisor, a negative or a non-finite weight.
    #[error("Invalid weight source value {value} at row {row}")]
    InvalidWeight { row: usize, value: f64 },

    /// The damped normal equations could not be solved.
    #[error("Singular Jacobian: the fit parameters are not independent")]
    SingularJacobian,

    /// Error indicating a singular matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// The optimizer stopped without meeting its convergence test.
    #[error("Fit did not converge after {iterations} iterations: {reason}")]
    NonConvergence { iterations: usize, reason: String },

    /// Malformed expression text.
    #[error("Parse error at position {position}: {message}")]
    ParseError { message: String, position: usize },

    /// An expression made only of whitespace.
    #[error("Expression is empty")]
    EmptyExpression,

    /// An expression without any fit parameter.
    #[error("Expression contains no fit parameters")]
    NoParametersInExpression,

    /// An identifier that is neither a parameter, a constant nor the variable.
    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    /// A lookup that leads back to the expression being compiled.
    #[error("Recursive reference to '{0}'")]
    RecursiveReference(String),

    /// A plugin unit lacks a required symbol.
    #[error("Plugin does not export the required symbol '{0}'")]
    MissingPluginSymbol(String),

    /// The model cannot be used as given.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The model exposes no parameters.
    #[error("No fit parameters defined")]
    NoParametersDefined,

    /// Band filter limits that are not strictly ordered.
    #[error("Invalid band limits: low cutoff {low} must be less than high cutoff {high}")]
    InvalidBandLimits { low: f64, high: f64 },

    /// Deconvolution response longer than half the signal.
    #[error("Response ({response} points) must be at most half the size of the signal ({signal} points)")]
    ResponseTooLarge { response: usize, signal: usize },

    /// Deconvolution response with an even length.
    #[error("Response must contain an odd number of points, got {0}")]
    ResponseLengthMustBeOdd(usize),

    /// Two data points share the same x.
    #[error("Duplicate x value {0}")]
    DuplicateXValues(f64),

    /// Savitzky-Golay order not below the window size.
    #[error("Polynomial order {order} must be less than the window size {window}")]
    OrderTooHigh { order: usize, window: usize },

    /// A working buffer could not be allocated.
    #[error("Could not allocate a buffer of {0} elements")]
    AllocationFailure(usize),

    /// A non-finite value or a panic inside user code during evaluation.
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Error indicating a mismatch in dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for numfit-rs operations.
pub type Result<T> = std::result::Result<T, FitError>;

impl FitError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        FitError::InvalidInput(message.into())
    }
}

/// Reserve a zeroed working buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_buffer(len: usize) -> Result<Vec<f64>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| FitError::AllocationFailure(len))?;
    buffer.resize(len, 0.0);
    Ok(buffer)
}
