use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

/// A single key/value pair attached to a meter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    key: Cow<'static, str>,
    value: Cow<'static, str>,
}

impl Tag {
    /// Creates a `Tag` from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Cow<'static, str>>,
        V: Into<Cow<'static, str>>,
    {
        Tag { key: key.into(), value: value.into() }
    }

    /// Key of this tag.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value of this tag.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl<K, V> From<(K, V)> for Tag
where
    K: Into<Cow<'static, str>>,
    V: Into<Cow<'static, str>>,
{
    fn from((key, value): (K, V)) -> Self {
        Tag::new(key, value)
    }
}

/// The kind of meter an [`Id`] describes.
///
/// The meter type is passed to the naming convention, and otherwise only serves as a descriptive hint: the aggregator
/// dispatches on the [`Snapshot`](crate::Snapshot) a meter produces, not on its declared type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeterType {
    /// A monotonically increasing count.
    Counter,

    /// A latency/duration recorder.
    Timer,

    /// A point-in-time value.
    Gauge,

    /// A distribution of arbitrary amounts.
    DistributionSummary,

    /// A counter whose value is read from a function.
    FunctionCounter,

    /// A timer whose count and total time are read from functions.
    FunctionTimer,

    /// A histogram.
    Histogram,

    /// Anything else.
    Other,
}

impl MeterType {
    /// Returns a string representation of the meter type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MeterType::Counter => "counter",
            MeterType::Timer => "timer",
            MeterType::Gauge => "gauge",
            MeterType::DistributionSummary => "distribution_summary",
            MeterType::FunctionCounter => "function_counter",
            MeterType::FunctionTimer => "function_timer",
            MeterType::Histogram => "histogram",
            MeterType::Other => "other",
        }
    }
}

impl fmt::Display for MeterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A meter identity.
///
/// An identity always includes a name and a meter type, and can optionally include tags, a base unit, and a
/// description. Tag keys are unique within an identity: adding a tag whose key is already present replaces the
/// existing value in place.
///
/// Two identities are equal when their names and tags are equal. The base unit, description, and meter type are
/// metadata and do not participate in equality or hashing.
#[derive(Clone, Debug)]
pub struct Id {
    name: Cow<'static, str>,
    tags: Vec<Tag>,
    base_unit: Option<Cow<'static, str>>,
    description: Option<Cow<'static, str>>,
    meter_type: MeterType,
}

impl Id {
    /// Creates an `Id` from a name and meter type.
    pub fn new<N>(name: N, meter_type: MeterType) -> Self
    where
        N: Into<Cow<'static, str>>,
    {
        Id { name: name.into(), tags: Vec::new(), base_unit: None, description: None, meter_type }
    }

    /// Adds a tag, replacing the value of any existing tag with the same key.
    #[must_use]
    pub fn with_tag<T>(mut self, tag: T) -> Self
    where
        T: Into<Tag>,
    {
        self.insert_tag(tag.into());
        self
    }

    /// Adds a set of tags, replacing the values of any existing tags with the same keys.
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        for tag in tags {
            self.insert_tag(tag.into());
        }
        self
    }

    /// Sets the base unit.
    #[must_use]
    pub fn with_base_unit<U>(mut self, base_unit: U) -> Self
    where
        U: Into<Cow<'static, str>>,
    {
        self.base_unit = Some(base_unit.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description<D>(mut self, description: D) -> Self
    where
        D: Into<Cow<'static, str>>,
    {
        self.description = Some(description.into());
        self
    }

    /// Changes the meter type.
    #[must_use]
    pub fn with_meter_type(mut self, meter_type: MeterType) -> Self {
        self.meter_type = meter_type;
        self
    }

    fn insert_tag(&mut self, tag: Tag) {
        match self.tags.iter_mut().find(|existing| existing.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => self.tags.push(tag),
        }
    }

    /// Name of this identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags of this identity, in insertion order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Gets the value of the tag with the given key, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|tag| tag.key() == key).map(Tag::value)
    }

    /// Base unit of this identity, if set.
    pub fn base_unit(&self) -> Option<&str> {
        self.base_unit.as_deref()
    }

    /// Description of this identity, if set.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Meter type of this identity.
    pub fn meter_type(&self) -> MeterType {
        self.meter_type
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tags == other.tags
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.tags.hash(state);
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.tags.is_empty() {
            f.write_str("{")?;
            for (i, tag) in self.tags.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}={}", tag.key, tag.value)?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}
