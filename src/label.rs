//! Frame labels and the call sites that produce them.
//!
//! A [`Label`] is the text of one logical frame. Labels are created once per
//! call site and cloned on every entry, so they are reference counted
//! strings. [`Signature`] renders method-like descriptions in the
//! `Type.method[Generic](ParamType name) // async` form, and [`CallSite`]
//! memoizes a label together with its source location.

use alloc::{format, string::String, sync::Arc, vec::Vec};
use core::{fmt, ops::Deref};

/// Prefix marking a frame that belongs to an asynchronous operation.
pub const ASYNC_PREFIX: &str = "async ";

/// Suffix the signature formatter appends to asynchronous methods.
pub const ASYNC_SUFFIX: &str = " // async";

/// The text of one logical frame.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(Arc<str>);

impl Label {
    /// Creates a label from any string.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Returns the label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns this label marked as an asynchronous frame.
    ///
    /// Labels that already carry the marker are returned unchanged.
    #[must_use]
    pub fn asynchronous(&self) -> Self {
        if self.is_asynchronous() {
            self.clone()
        } else {
            Self::new(format!("{ASYNC_PREFIX}{}", self.0))
        }
    }

    /// Returns `true` if the label is marked as an asynchronous frame.
    pub fn is_asynchronous(&self) -> bool {
        self.0.starts_with(ASYNC_PREFIX)
    }
}

impl Deref for Label {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl From<&str> for Label {
    fn from(text: &str) -> Self {
        Self(Arc::from(text))
    }
}

impl From<String> for Label {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

impl From<&Label> for Label {
    fn from(label: &Label) -> Self {
        label.clone()
    }
}

impl PartialEq<str> for Label {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Label {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// Builder for method-style labels.
///
/// # Examples
///
/// ```
/// use logical_stack::Signature;
///
/// let label = Signature::new("Get")
///     .declared_in("Cache")
///     .generic("K")
///     .generic("V")
///     .param("K", "key")
///     .param("bool", "refresh")
///     .asynchronous()
///     .to_label();
///
/// assert_eq!(label, "Cache.Get[K,V](K key, bool refresh) // async");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Signature<'a> {
    declaring_type: Option<&'a str>,
    method: &'a str,
    generics: Vec<&'a str>,
    params: Vec<(&'a str, &'a str)>,
    asynchronous: bool,
}

impl<'a> Signature<'a> {
    /// Starts a signature for `method`.
    pub fn new(method: &'a str) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    /// Sets the declaring type. Rust path separators are rendered as `.`.
    #[must_use]
    pub fn declared_in(mut self, declaring_type: &'a str) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }

    /// Adds a generic argument.
    #[must_use]
    pub fn generic(mut self, name: &'a str) -> Self {
        self.generics.push(name);
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(mut self, ty: &'a str, name: &'a str) -> Self {
        self.params.push((ty, name));
        self
    }

    /// Marks the method as asynchronous.
    #[must_use]
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    /// Renders the signature into a [`Label`].
    pub fn to_label(&self) -> Label {
        Label::from(format!("{self}"))
    }
}

impl fmt::Display for Signature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(declaring_type) = self.declaring_type {
            for (i, segment) in declaring_type.split("::").enumerate() {
                if i > 0 {
                    f.write_str(".")?;
                }
                f.write_str(segment)?;
            }
            f.write_str(".")?;
        }
        f.write_str(self.method)?;
        if !self.generics.is_empty() {
            write!(f, "[{}]", self.generics.join(","))?;
        }
        f.write_str("(")?;
        for (i, (ty, name)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty} {name}")?;
        }
        f.write_str(")")?;
        if self.asynchronous {
            f.write_str(ASYNC_SUFFIX)?;
        }
        Ok(())
    }
}

/// One instrumented call site.
///
/// Meant to live in a `static` (see [`enter!`](crate::enter) and
/// [`call_site!`](crate::call_site)). The labels are rendered the first time
/// they are asked for and cached; concurrent first uses render exactly once.
pub struct CallSite {
    name: &'static str,
    file: &'static str,
    line: u32,
    label: spin::Once<Label>,
    async_label: spin::Once<Label>,
}

impl CallSite {
    /// Describes the call site `name` at `file:line`.
    pub const fn new(name: &'static str, file: &'static str, line: u32) -> Self {
        Self {
            name,
            file,
            line,
            label: spin::Once::new(),
            async_label: spin::Once::new(),
        }
    }

    /// The name this call site was declared with.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The source file of the call site.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// The source line of the call site.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// The synchronous frame label, `name in file:line n`.
    pub fn label(&self) -> &Label {
        self.label.call_once(|| {
            tracing::trace!(target: "logical_stack", name = self.name, "rendering call site label");
            Label::from(format!("{} in {}:line {}", self.name, self.file, self.line))
        })
    }

    /// The asynchronous frame label, `async name`.
    pub fn async_label(&self) -> &Label {
        self.async_label
            .call_once(|| Label::from(self.name).asynchronous())
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("name", &self.name)
            .field("file", &self.file)
            .field("line", &self.line)
            .finish()
    }
}
