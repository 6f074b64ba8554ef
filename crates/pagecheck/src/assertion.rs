//! Assertions over element snapshots.
//!
//! Expectations are evaluated against an [`ElementHandle`] already resolved
//! by a [`crate::Locator`]. Chains stop at the first failure and report it
//! with both the expected and the observed value.
//!
//! ```ignore
//! let viewer = session.select_nth("stJson", 0).await?;
//! expect(&viewer).to_contain("foo")?.and_contain("bar")?;
//! ```

use crate::driver::ElementHandle;
use crate::result::{HarnessError, HarnessResult};
use regex::Regex;
use std::fmt;

/// Placeholder reported as the actual value of a missing attribute
pub const ABSENT: &str = "<absent>";

/// One condition an element must meet
#[derive(Debug, Clone)]
pub enum Expectation {
    /// `textContent` contains the substring
    ContainsText(String),
    /// `textContent` equals the string exactly
    TextEquals(String),
    /// Attribute is present (any value)
    HasAttribute(String),
    /// Attribute value equals the string exactly
    AttributeEquals {
        /// Attribute name
        name: String,
        /// Expected value
        value: String,
    },
    /// Attribute value contains the substring
    AttributeContains {
        /// Attribute name
        name: String,
        /// Expected substring
        fragment: String,
    },
    /// Attribute value matches the pattern
    AttributeMatches {
        /// Attribute name
        name: String,
        /// Compiled pattern
        pattern: Regex,
    },
}

impl Expectation {
    /// Text contains `fragment`
    #[must_use]
    pub fn contains_text(fragment: impl Into<String>) -> Self {
        Self::ContainsText(fragment.into())
    }

    /// Text equals `text`
    #[must_use]
    pub fn text_equals(text: impl Into<String>) -> Self {
        Self::TextEquals(text.into())
    }

    /// Attribute `name` is present
    #[must_use]
    pub fn has_attribute(name: impl Into<String>) -> Self {
        Self::HasAttribute(name.into())
    }

    /// Attribute `name` equals `value`
    #[must_use]
    pub fn attribute_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AttributeEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Attribute `name` contains `fragment`
    #[must_use]
    pub fn attribute_contains(name: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::AttributeContains {
            name: name.into(),
            fragment: fragment.into(),
        }
    }

    /// Attribute `name` matches `pattern`
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Regex`] if the pattern does not compile
    pub fn attribute_matches(name: impl Into<String>, pattern: &str) -> HarnessResult<Self> {
        Ok(Self::AttributeMatches {
            name: name.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// Check the element
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] naming the expectation, the
    /// expected value, and what the element actually had
    pub fn evaluate(&self, element: &ElementHandle) -> HarnessResult<()> {
        let text = element.text_content.as_str();
        let passed = match self {
            Self::ContainsText(fragment) => text.contains(fragment.as_str()),
            Self::TextEquals(expected) => text == expected.as_str(),
            Self::HasAttribute(name) => element.attribute(name).is_some(),
            Self::AttributeEquals { name, value } => {
                element.attribute(name) == Some(value.as_str())
            }
            Self::AttributeContains { name, fragment } => element
                .attribute(name)
                .is_some_and(|v| v.contains(fragment.as_str())),
            Self::AttributeMatches { name, pattern } => {
                element.attribute(name).is_some_and(|v| pattern.is_match(v))
            }
        };
        if passed {
            return Ok(());
        }
        Err(HarnessError::AssertionFailure {
            expectation: self.to_string(),
            expected: self.expected().to_string(),
            actual: self.actual(element).to_string(),
        })
    }

    fn expected(&self) -> &str {
        match self {
            Self::ContainsText(s) | Self::TextEquals(s) | Self::HasAttribute(s) => s,
            Self::AttributeEquals { value, .. } => value,
            Self::AttributeContains { fragment, .. } => fragment,
            Self::AttributeMatches { pattern, .. } => pattern.as_str(),
        }
    }

    fn actual<'e>(&self, element: &'e ElementHandle) -> &'e str {
        match self {
            Self::ContainsText(_) | Self::TextEquals(_) => &element.text_content,
            Self::HasAttribute(name)
            | Self::AttributeEquals { name, .. }
            | Self::AttributeContains { name, .. }
            | Self::AttributeMatches { name, .. } => element.attribute(name).unwrap_or(ABSENT),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContainsText(_) => f.write_str("text to contain"),
            Self::TextEquals(_) => f.write_str("text to equal"),
            Self::HasAttribute(name) => write!(f, "attribute {name} to be present"),
            Self::AttributeEquals { name, .. } => write!(f, "attribute {name} to equal"),
            Self::AttributeContains { name, .. } => write!(f, "attribute {name} to contain"),
            Self::AttributeMatches { name, .. } => write!(f, "attribute {name} to match"),
        }
    }
}

/// Evaluate expectations in order, stopping at the first failure
///
/// # Errors
///
/// Returns the first [`HarnessError::AssertionFailure`]
pub fn evaluate_all(element: &ElementHandle, expectations: &[Expectation]) -> HarnessResult<()> {
    expectations.iter().try_for_each(|e| e.evaluate(element))
}

/// Start an expectation chain on an element
#[must_use]
pub const fn expect(element: &ElementHandle) -> Expect<'_> {
    Expect { element }
}

/// Fluent expectation chain; each step returns `Err` on the first failure
#[derive(Debug, Clone, Copy)]
pub struct Expect<'a> {
    element: &'a ElementHandle,
}

impl<'a> Expect<'a> {
    /// Check an arbitrary expectation
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] if it does not hold
    pub fn to_satisfy(self, expectation: &Expectation) -> HarnessResult<Self> {
        expectation.evaluate(self.element)?;
        Ok(self)
    }

    /// Text contains `fragment`
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] if it does not
    pub fn to_contain(self, fragment: &str) -> HarnessResult<Self> {
        self.to_satisfy(&Expectation::contains_text(fragment))
    }

    /// Chained form of [`Expect::to_contain`]
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] if the text does not contain `fragment`
    pub fn and_contain(self, fragment: &str) -> HarnessResult<Self> {
        self.to_contain(fragment)
    }

    /// Text equals `text`
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] if it does not
    pub fn to_have_text(self, text: &str) -> HarnessResult<Self> {
        self.to_satisfy(&Expectation::text_equals(text))
    }

    /// Attribute `name` is present; chain continues on the attribute value
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] if it is absent
    pub fn to_have_attribute(self, name: &str) -> HarnessResult<AttributeExpect<'a>> {
        Expectation::has_attribute(name).evaluate(self.element)?;
        Ok(AttributeExpect {
            element: self.element,
            name: name.to_string(),
        })
    }

    /// Attribute `name` contains `fragment`
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] if it does not
    pub fn to_have_attribute_containing(self, name: &str, fragment: &str) -> HarnessResult<Self> {
        self.to_satisfy(&Expectation::attribute_contains(name, fragment))
    }

    /// Attribute `name` matches `pattern`
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Regex`] for a bad pattern, otherwise
    /// [`HarnessError::AssertionFailure`] if it does not match
    pub fn to_have_attribute_matching(self, name: &str, pattern: &str) -> HarnessResult<Self> {
        self.to_satisfy(&Expectation::attribute_matches(name, pattern)?)
    }
}

/// Expectation chain narrowed to one attribute value
#[derive(Debug, Clone)]
pub struct AttributeExpect<'a> {
    element: &'a ElementHandle,
    name: String,
}

impl AttributeExpect<'_> {
    /// The attribute value
    #[must_use]
    pub fn value(&self) -> &str {
        self.element.attribute(&self.name).unwrap_or(ABSENT)
    }

    /// Value contains `fragment`
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] if it does not
    pub fn to_contain(self, fragment: &str) -> HarnessResult<Self> {
        Expectation::attribute_contains(self.name.as_str(), fragment).evaluate(self.element)?;
        Ok(self)
    }

    /// Value equals `value`
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AssertionFailure`] if it does not
    pub fn to_equal(self, value: &str) -> HarnessResult<Self> {
        Expectation::attribute_equals(self.name.as_str(), value).evaluate(self.element)?;
        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn viewer() -> ElementHandle {
        ElementHandle::new("div")
            .with_attribute("data-testid", "stJson")
            .with_text("{\"foo\": \"bar\"}")
    }

    fn icon() -> ElementHandle {
        ElementHandle::new("link")
            .with_attribute("rel", "shortcut icon")
            .with_attribute("href", "./media/abc123.png")
    }

    mod expectation_tests {
        use super::*;

        #[test]
        fn test_contains_text() {
            assert!(Expectation::contains_text("foo").evaluate(&viewer()).is_ok());
            assert!(Expectation::contains_text("").evaluate(&viewer()).is_ok());
            assert!(Expectation::contains_text("baz").evaluate(&viewer()).is_err());
        }

        #[test]
        fn test_text_equals_is_exact() {
            let el = ElementHandle::new("div").with_text("...");
            assert!(Expectation::text_equals("...").evaluate(&el).is_ok());
            assert!(Expectation::text_equals("..").evaluate(&el).is_err());
        }

        #[test]
        fn test_attribute_expectations() {
            let el = icon();
            assert!(Expectation::has_attribute("href").evaluate(&el).is_ok());
            assert!(Expectation::attribute_contains("href", "abc123.png")
                .evaluate(&el)
                .is_ok());
            assert!(Expectation::attribute_equals("rel", "shortcut icon")
                .evaluate(&el)
                .is_ok());
            assert!(Expectation::attribute_matches("href", r"[0-9a-f]+\.png$")
                .unwrap()
                .evaluate(&el)
                .is_ok());
        }

        #[test]
        fn test_failure_reports_expected_and_actual() {
            match Expectation::contains_text("baz").evaluate(&viewer()).unwrap_err() {
                HarnessError::AssertionFailure {
                    expectation,
                    expected,
                    actual,
                } => {
                    assert_eq!(expectation, "text to contain");
                    assert_eq!(expected, "baz");
                    assert_eq!(actual, "{\"foo\": \"bar\"}");
                }
                other => panic!("expected assertion failure, got {other:?}"),
            }
        }

        #[test]
        fn test_missing_attribute_reports_absent() {
            let err = Expectation::attribute_contains("href", "x")
                .evaluate(&viewer())
                .unwrap_err();
            assert!(err.to_string().contains(ABSENT));
        }

        #[test]
        fn test_bad_pattern_is_regex_error() {
            let err = Expectation::attribute_matches("href", "(").unwrap_err();
            assert_eq!(err.kind(), "regex");
        }

        #[test]
        fn test_evaluate_all_stops_at_first_failure() {
            let checks = [
                Expectation::contains_text("foo"),
                Expectation::contains_text("nope"),
                Expectation::contains_text("also nope"),
            ];
            let err = evaluate_all(&viewer(), &checks).unwrap_err();
            assert!(err.to_string().contains("\"nope\""));
            assert!(!err.to_string().contains("also nope"));
        }
    }

    mod expect_chain_tests {
        use super::*;

        #[test]
        fn test_chain_passes() {
            let el = viewer();
            expect(&el).to_contain("foo").unwrap().and_contain("bar").unwrap();
        }

        #[test]
        fn test_chain_stops_on_first_failure() {
            let el = viewer();
            let err = expect(&el)
                .to_contain("missing")
                .and_then(|e| e.and_contain("bar"))
                .unwrap_err();
            assert!(err.to_string().contains("missing"));
        }

        #[test]
        fn test_attribute_chain() {
            let el = icon();
            let attr = expect(&el)
                .to_have_attribute("href")
                .unwrap()
                .to_contain("abc123.png")
                .unwrap();
            assert_eq!(attr.value(), "./media/abc123.png");
            assert!(expect(&el).to_have_attribute("title").is_err());
        }
    }
}
