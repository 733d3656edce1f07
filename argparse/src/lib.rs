//! Table-driven command-line option parsing.
//!
//! A caller declares a fixed [`OptionTable`] of typed options, hands it the
//! raw argument vector, and reads typed values back by short or long name:
//! - `-x`, `-x=value`, `--name`, `--name=value` forms
//! - positional arguments must precede every named option
//! - unknown options and value-less non-boolean options are tolerated
//! - values are owned by their table slot and released by [`OptionTable::clear`]
//!   or on drop

use tracing::{debug, error, trace};

// ============================================================================
// Result and Error types
// ============================================================================

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("unable to split argument {0:?}")]
    MalformedArgument(String),

    #[error("could not parse argument {0:?}: positional arguments must come before options")]
    UnexpectedPositional(String),

    #[error("invalid data type found in options: {0}")]
    InvalidOptionKind(String),

    #[error("option --{0} is declared more than once")]
    DuplicateOption(String),

    #[error("option not found: {0}")]
    NotFound(String),

    #[error("type mismatch for option {name}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: OptKind,
        found: OptKind,
    },
}

// ============================================================================
// OptKind / OptValue
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptKind {
    Boolean,
    Integer,
    Float,
    String,
}

impl std::fmt::Display for OptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OptKind::Boolean => "boolean",
            OptKind::Integer => "integer",
            OptKind::Float => "float",
            OptKind::String => "string",
        };
        f.write_str(s)
    }
}

/// Decodes the numeric tags used by C option tables (`ARG_OPT_BOOLEAN = 0`..).
impl TryFrom<u8> for OptKind {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(OptKind::Boolean),
            1 => Ok(OptKind::Integer),
            2 => Ok(OptKind::Float),
            3 => Ok(OptKind::String),
            other => Err(Error::InvalidOptionKind(format!("unknown kind tag {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    Boolean(bool),
    Integer(i32),
    Float(f32),
    String(String),
}

impl OptValue {
    pub fn kind(&self) -> OptKind {
        match self {
            OptValue::Boolean(_) => OptKind::Boolean,
            OptValue::Integer(_) => OptKind::Integer,
            OptValue::Float(_) => OptKind::Float,
            OptValue::String(_) => OptKind::String,
        }
    }
}

impl std::fmt::Display for OptValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptValue::Boolean(b) => write!(f, "{}", b),
            OptValue::Integer(n) => write!(f, "{}", n),
            OptValue::Float(n) => write!(f, "{}", n),
            OptValue::String(s) => f.write_str(s),
        }
    }
}

/// Trait for converting Rust values into OptValue
pub trait IntoOptValue {
    fn into_opt_value(self) -> OptValue;
}

impl IntoOptValue for bool {
    fn into_opt_value(self) -> OptValue {
        OptValue::Boolean(self)
    }
}

impl IntoOptValue for i32 {
    fn into_opt_value(self) -> OptValue {
        OptValue::Integer(self)
    }
}

impl IntoOptValue for f32 {
    fn into_opt_value(self) -> OptValue {
        OptValue::Float(self)
    }
}

impl IntoOptValue for &str {
    fn into_opt_value(self) -> OptValue {
        OptValue::String(self.to_string())
    }
}

impl IntoOptValue for String {
    fn into_opt_value(self) -> OptValue {
        OptValue::String(self)
    }
}

/// Typed retrieval from a stored value.
pub trait FromOptValue: Sized {
    const KIND: OptKind;

    fn from_opt_value(v: &OptValue) -> Option<Self>;
}

impl FromOptValue for bool {
    const KIND: OptKind = OptKind::Boolean;

    fn from_opt_value(v: &OptValue) -> Option<Self> {
        match v {
            OptValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromOptValue for i32 {
    const KIND: OptKind = OptKind::Integer;

    fn from_opt_value(v: &OptValue) -> Option<Self> {
        match v {
            OptValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl FromOptValue for f32 {
    const KIND: OptKind = OptKind::Float;

    fn from_opt_value(v: &OptValue) -> Option<Self> {
        match v {
            OptValue::Float(n) => Some(*n),
            _ => None,
        }
    }
}

impl FromOptValue for String {
    const KIND: OptKind = OptKind::String;

    fn from_opt_value(v: &OptValue) -> Option<Self> {
        match v {
            OptValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

// ============================================================================
// Opt — option descriptor
// ============================================================================

#[derive(Debug, Clone)]
pub struct Opt {
    kind: OptKind,
    short_name: Option<char>,
    long_name: String,
    value: Option<OptValue>,
    default_value: Option<OptValue>,
    description: Option<String>,
}

impl Opt {
    /// A boolean option named `name`; change it with [`Opt::with_kind`].
    pub fn new(name: &str) -> Self {
        Opt {
            kind: OptKind::Boolean,
            short_name: None,
            long_name: name.to_string(),
            value: None,
            default_value: None,
            description: None,
        }
    }

    pub fn boolean(name: &str) -> Self {
        Opt::new(name).with_kind(OptKind::Boolean)
    }

    pub fn integer(name: &str) -> Self {
        Opt::new(name).with_kind(OptKind::Integer)
    }

    pub fn float(name: &str) -> Self {
        Opt::new(name).with_kind(OptKind::Float)
    }

    pub fn string(name: &str) -> Self {
        Opt::new(name).with_kind(OptKind::String)
    }

    pub fn short(mut self, c: char) -> Self {
        self.short_name = Some(c);
        self
    }

    pub fn with_kind(mut self, kind: OptKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn default_val<T: IntoOptValue>(mut self, v: T) -> Self {
        self.default_value = Some(v.into_opt_value());
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn kind(&self) -> OptKind {
        self.kind
    }

    pub fn short_name(&self) -> Option<char> {
        self.short_name
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn value(&self) -> Option<&OptValue> {
        self.value.as_ref()
    }

    pub fn default_value(&self) -> Option<&OptValue> {
        self.default_value.as_ref()
    }

    pub fn help(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True when `name` is this option's long name or its single-character short name.
    fn matches(&self, name: &str) -> bool {
        if self.long_name == name {
            return true;
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next(), self.short_name) {
            (Some(c), None, Some(short)) => c == short,
            _ => false,
        }
    }
}

// ============================================================================
// Argument splitter
// ============================================================================

/// One raw token split into its option name and inline value.
///
/// A positional token has no name and carries its whole text as the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitArg<'a> {
    pub name: Option<&'a str>,
    pub value: Option<&'a str>,
}

impl SplitArg<'_> {
    pub fn is_positional(&self) -> bool {
        self.name.is_none()
    }
}

/// Split `--port=8080` into `port` and `8080`.
///
/// `-x` and `--name` forms lose their dashes; an empty value after `=` is
/// reported as no value at all.
pub fn split_arg(arg: &str) -> Result<SplitArg<'_>> {
    if arg == "-" || arg == "--" {
        return Err(Error::MalformedArgument(arg.to_string()));
    }

    if !arg.starts_with('-') {
        return Ok(SplitArg {
            name: None,
            value: Some(arg),
        });
    }

    let body = match arg.strip_prefix("--") {
        Some(long) => long,
        None => &arg[1..],
    };

    match body.split_once('=') {
        Some((name, value)) => Ok(SplitArg {
            name: Some(name),
            value: if value.is_empty() { None } else { Some(value) },
        }),
        None => Ok(SplitArg {
            name: Some(body),
            value: None,
        }),
    }
}

// ============================================================================
// Value coercer
// ============================================================================

/// Store `raw` into `opt` according to its kind.
///
/// Booleans are presence flags and always become `true`. Other kinds ignore a
/// missing value and keep whatever they held before.
pub fn coerce_value(opt: Option<&mut Opt>, raw: Option<&str>) {
    let Some(opt) = opt else {
        return;
    };

    let stored = match (opt.kind, raw) {
        (OptKind::Boolean, _) => OptValue::Boolean(true),
        (_, None) => {
            debug!(option = %opt.long_name, kind = %opt.kind, "option given without a value, ignored");
            return;
        }
        (OptKind::Integer, Some(raw)) => OptValue::Integer(atoi(raw)),
        (OptKind::Float, Some(raw)) => OptValue::Float(atof(raw) as f32),
        (OptKind::String, Some(raw)) => OptValue::String(raw.to_string()),
    };

    trace!(option = %opt.long_name, value = %stored, "stored option value");
    opt.value = Some(stored);
}

/// Decimal integer prefix of `s`, 0 when there is none. Overflow wraps.
fn atoi(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut n: i32 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        n = n.wrapping_mul(10).wrapping_add((b - b'0') as i32);
    }
    if negative {
        n.wrapping_neg()
    } else {
        n
    }
}

/// Decimal floating-point prefix of `s`, 0.0 when there is none.
fn atof(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let rest = s[end..].to_ascii_lowercase();
    for word in ["infinity", "inf", "nan"] {
        if rest.starts_with(word) {
            return s[..end + word.len()].parse().unwrap_or(0.0);
        }
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }

    if mantissa_digits == 0 {
        return 0.0;
    }

    // The exponent only counts when at least one digit follows it.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

// ============================================================================
// OptionTable
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    ScanningPositional,
    ScanningOptional,
}

#[derive(Debug, Clone, Default)]
pub struct OptionTable {
    options: Vec<Opt>,
    positional: Option<String>,
}

impl OptionTable {
    pub fn new() -> Self {
        OptionTable::default()
    }

    pub fn option(mut self, opt: Opt) -> Self {
        self.options.push(opt);
        self
    }

    pub fn options(&self) -> &[Opt] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Parse the process arguments.
    pub fn parse_env(&mut self) -> Result<()> {
        self.parse(std::env::args())
    }

    /// Parse a full argument vector; the first element is the program name.
    ///
    /// On error the table keeps whatever values were stored before the
    /// failing token.
    pub fn parse<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Err(e) = self.check() {
            error!("{}", e);
            return Err(e);
        }

        let mut state = ScanState::Start;
        for arg in args.into_iter().skip(1) {
            let arg = arg.as_ref();
            trace!(arg, ?state, "scanning argument");

            let split = split_arg(arg).inspect_err(|e| error!("{}", e))?;

            match split.name {
                None => {
                    if state == ScanState::ScanningOptional {
                        let e = Error::UnexpectedPositional(arg.to_string());
                        error!("{}", e);
                        return Err(e);
                    }
                    state = ScanState::ScanningPositional;
                    self.positional = split.value.map(str::to_string);
                }
                Some(name) => {
                    state = ScanState::ScanningOptional;
                    let opt = self.find_option_mut(name);
                    if opt.is_none() {
                        debug!(option = name, "unknown option ignored");
                    }
                    coerce_value(opt, split.value);
                }
            }
        }
        Ok(())
    }

    /// Checks every descriptor before any argument is consumed.
    fn check(&self) -> Result<()> {
        for (i, opt) in self.options.iter().enumerate() {
            if opt.long_name.is_empty() {
                return Err(Error::InvalidOptionKind(format!(
                    "option #{} has an empty long name",
                    i
                )));
            }
            for slot in [&opt.default_value, &opt.value].into_iter().flatten() {
                if slot.kind() != opt.kind {
                    return Err(Error::InvalidOptionKind(format!(
                        "--{} is declared {} but holds a {} value",
                        opt.long_name,
                        opt.kind,
                        slot.kind()
                    )));
                }
            }
            if self.options[..i].iter().any(|o| o.long_name == opt.long_name) {
                return Err(Error::DuplicateOption(opt.long_name.clone()));
            }
        }
        Ok(())
    }

    fn find_option_mut(&mut self, name: &str) -> Option<&mut Opt> {
        self.options.iter_mut().find(|o| o.matches(name))
    }

    /// First option whose long name is `name` or whose short name is the single character `name`.
    pub fn get_option_by_name(&self, name: &str) -> Option<&Opt> {
        self.options.iter().find(|o| o.matches(name))
    }

    pub fn get_option_value(&self, name: &str) -> Option<&OptValue> {
        self.get_option_by_name(name).and_then(Opt::value)
    }

    /// Get a typed value by short or long name.
    ///
    /// `Ok(None)` means the option is declared but was never given.
    pub fn get<T: FromOptValue>(&self, name: &str) -> Result<Option<T>> {
        let opt = self
            .get_option_by_name(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        opt.value().map(|v| typed(name, v)).transpose()
    }

    /// Like [`OptionTable::get`], falling back to the declared default.
    pub fn get_or_default<T: FromOptValue>(&self, name: &str) -> Result<Option<T>> {
        if let Some(v) = self.get::<T>(name)? {
            return Ok(Some(v));
        }
        let opt = self
            .get_option_by_name(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        opt.default_value().map(|v| typed(name, v)).transpose()
    }

    /// Check if an option was given on the command line
    pub fn is_set(&self, name: &str) -> bool {
        self.get_option_value(name).is_some()
    }

    /// The last positional argument seen before the first option.
    pub fn positional(&self) -> Option<&str> {
        self.positional.as_deref()
    }

    /// Release every parsed value; the declarations themselves are kept.
    pub fn clear(&mut self) {
        for opt in &mut self.options {
            opt.value = None;
        }
        self.positional = None;
    }
}

fn typed<T: FromOptValue>(name: &str, v: &OptValue) -> Result<T> {
    T::from_opt_value(v).ok_or_else(|| Error::TypeMismatch {
        name: name.to_string(),
        expected: T::KIND,
        found: v.kind(),
    })
}
