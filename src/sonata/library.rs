//! sonata::library
//!
//! Categorical attribute codec.
//!
//! # Encoding
//!
//! A categorical column is stored as two datasets:
//! - `<group>/@library/<attr>`: the distinct values, in first-seen order
//! - `<group>/<attr>`: one integer per row, indexing into the library
//!
//! The value-to-index map is built once per write, so encoding the same
//! input always yields the same library and indices.
//!
//! # Example
//!
//! ```
//! use sonatakit::sonata::library::Library;
//!
//! let (library, indices) = Library::encode(&["L5_TPC", "L23_MC", "L5_TPC"]);
//! assert_eq!(library.values(), &["L5_TPC".to_string(), "L23_MC".to_string()]);
//! assert_eq!(indices, vec![0, 1, 0]);
//! assert_eq!(library.decode(&indices).unwrap(), vec!["L5_TPC", "L23_MC", "L5_TPC"]);
//! ```

use std::collections::HashMap;

use crate::core::container::{Container, Dataset};
use crate::core::error::{CurateError, CurateResult};
use crate::core::paths;
use crate::core::types::Category;

/// Distinct values of a categorical attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Library {
    values: Vec<String>,
}

impl Library {
    /// Encode a sequence, collecting distinct values in first-seen order.
    pub fn encode<S: AsRef<str>>(values: &[S]) -> (Library, Vec<i64>) {
        let mut lookup: HashMap<&str, i64> = HashMap::new();
        let mut library = Vec::new();
        let indices = values
            .iter()
            .map(|v| {
                let v = v.as_ref();
                *lookup.entry(v).or_insert_with(|| {
                    library.push(v.to_string());
                    (library.len() - 1) as i64
                })
            })
            .collect();
        (Library { values: library }, indices)
    }

    /// Wrap stored library values, checking they are unique.
    pub fn from_values(values: Vec<String>) -> CurateResult<Library> {
        let mut seen = std::collections::HashSet::with_capacity(values.len());
        for v in &values {
            if !seen.insert(v.as_str()) {
                return Err(CurateError::invariant(
                    "library",
                    format!("duplicate library value '{}'", v),
                ));
            }
        }
        Ok(Library { values })
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Map indices back to values.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if any index falls outside the library.
    pub fn decode(&self, indices: &[i64]) -> CurateResult<Vec<String>> {
        indices
            .iter()
            .map(|&i| {
                usize::try_from(i)
                    .ok()
                    .and_then(|i| self.values.get(i))
                    .cloned()
                    .ok_or_else(|| {
                        CurateError::invariant(
                            "library",
                            format!("index {} outside library of {} values", i, self.len()),
                        )
                    })
            })
            .collect()
    }
}

/// Write `values` as a Library-encoded column, replacing any previous
/// column and library of the same name.
pub fn write_categorical<S: AsRef<str>>(
    container: &mut Container,
    category: Category,
    population: &str,
    group_id: &str,
    attribute: &str,
    values: &[S],
) -> CurateResult<Library> {
    let (library, indices) = Library::encode(values);
    container.put_dataset(
        &paths::library(category, population, group_id, attribute),
        Dataset::texts(library.values().to_vec()),
    )?;
    container.put_dataset(
        &paths::attribute(category, population, group_id, attribute),
        Dataset::ints(indices),
    )?;
    Ok(library)
}

/// Whether the attribute is stored with a Library.
pub fn is_categorical(
    container: &Container,
    category: Category,
    population: &str,
    group_id: &str,
    attribute: &str,
) -> bool {
    container.contains(&paths::library(category, population, group_id, attribute))
}

/// Read a text attribute, decoding through its Library when it has one.
///
/// # Errors
///
/// - `NotFound` if the column is absent
/// - `Schema`-like `ShapeMismatch` if the column is numeric without a Library
pub fn read_strings(
    container: &Container,
    category: Category,
    population: &str,
    group_id: &str,
    attribute: &str,
) -> CurateResult<Vec<String>> {
    let column_path = paths::attribute(category, population, group_id, attribute);
    let column = container
        .dataset(&column_path)
        .map_err(|_| CurateError::not_found("attribute", column_path.clone()))?;

    if is_categorical(container, category, population, group_id, attribute) {
        let library_path = paths::library(category, population, group_id, attribute);
        let values = container
            .dataset(&library_path)?
            .as_texts()
            .ok_or_else(|| CurateError::invariant(&library_path, "library is not text"))?
            .to_vec();
        let indices = column
            .as_ints()
            .ok_or_else(|| CurateError::invariant(&column_path, "library index is not integer"))?;
        return Library::from_values(values)?.decode(indices);
    }

    column
        .as_texts()
        .map(<[String]>::to_vec)
        .ok_or_else(|| CurateError::ShapeMismatch {
            attribute: column_path,
            message: format!("expected text, found {}", column.data.dtype()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_seen_order() {
        let (library, indices) = Library::encode(&["b", "a", "b", "c", "a"]);
        assert_eq!(library.values(), &["b", "a", "c"]);
        assert_eq!(indices, vec![0, 1, 0, 2, 1]);
    }

    #[test]
    fn empty_input() {
        let (library, indices) = Library::encode::<&str>(&[]);
        assert!(library.is_empty());
        assert!(indices.is_empty());
    }

    #[test]
    fn decode_rejects_out_of_range() {
        let (library, _) = Library::encode(&["x"]);
        assert!(library.decode(&[0, 1]).is_err());
        assert!(library.decode(&[-1]).is_err());
    }

    #[test]
    fn duplicate_stored_values_rejected() {
        assert!(Library::from_values(vec!["a".into(), "a".into()]).is_err());
    }

    #[test]
    fn write_then_read_categorical() {
        let mut c = Container::new();
        write_categorical(
            &mut c,
            Category::Nodes,
            "pop",
            "0",
            "mtype",
            &["L1_DAC", "L1_DAC", "L6_BPC"],
        )
        .unwrap();

        assert!(is_categorical(&c, Category::Nodes, "pop", "0", "mtype"));
        assert_eq!(
            c.dataset("nodes/pop/0/mtype").unwrap().as_ints().unwrap(),
            &[0, 0, 1]
        );
        assert_eq!(
            read_strings(&c, Category::Nodes, "pop", "0", "mtype").unwrap(),
            vec!["L1_DAC", "L1_DAC", "L6_BPC"]
        );
    }

    #[test]
    fn read_raw_text_column() {
        let mut c = Container::new();
        c.put_dataset(
            "nodes/pop/0/morphology",
            Dataset::texts(vec!["m0".into(), "m1".into()]),
        )
        .unwrap();
        assert_eq!(
            read_strings(&c, Category::Nodes, "pop", "0", "morphology").unwrap(),
            vec!["m0", "m1"]
        );
    }

    #[test]
    fn read_numeric_column_without_library_fails() {
        let mut c = Container::new();
        c.put_dataset("nodes/pop/0/x", Dataset::floats(vec![1.0]))
            .unwrap();
        assert!(matches!(
            read_strings(&c, Category::Nodes, "pop", "0", "x"),
            Err(CurateError::ShapeMismatch { .. })
        ));
    }
}
