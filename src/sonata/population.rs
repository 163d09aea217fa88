//! sonata::population
//!
//! Population addressing inside a category-rooted container.
//!
//! # Invariants
//!
//! - A container holds exactly one category group (`nodes` or `edges`)
//! - Omitting a population name is only valid when exactly one exists
//! - Every write goes through [`edit_container`]: lock, load, mutate,
//!   atomic save. A failing mutation leaves the file as it was.
//!
//! # Example
//!
//! ```no_run
//! use sonatakit::sonata::population::{get_population_name, rename_population};
//! use std::path::Path;
//!
//! let nodes = Path::new("nodes.json");
//! let current = get_population_name(nodes, None).unwrap();
//! rename_population(nodes, "hippocampus_neurons", Some(&current)).unwrap();
//! ```

use std::path::Path;

use crate::core::container::{join, Container, Data, Dataset, Node};
use crate::core::error::{CurateError, CurateResult};
use crate::core::ops::lock::ContainerLock;
use crate::core::paths;
use crate::core::types::{Category, PopulationName};
use crate::sonata::library::{is_categorical, write_categorical};

/// Sentinel stored in backfilled type-id columns.
pub const TYPE_ID_SENTINEL: i64 = -1;

/// Value written by [`set_group_attribute`].
///
/// Scalars are broadcast to every row of the group; arrays must match the
/// group length.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Text(String),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Texts(Vec<String>),
}

impl AttributeValue {
    /// Parse a scalar from the command line: integer, then float, then text.
    ///
    /// # Example
    ///
    /// ```
    /// use sonatakit::sonata::population::AttributeValue;
    ///
    /// assert_eq!(AttributeValue::parse("3"), AttributeValue::Int(3));
    /// assert_eq!(AttributeValue::parse("2.2"), AttributeValue::Float(2.2));
    /// assert_eq!(AttributeValue::parse("biophysical"), AttributeValue::Text("biophysical".into()));
    /// ```
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            AttributeValue::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            AttributeValue::Float(f)
        } else {
            AttributeValue::Text(raw.to_string())
        }
    }

    /// Parse command-line values: one value is a scalar, several are an
    /// array typed by the narrowest type every value parses as.
    ///
    /// # Example
    ///
    /// ```
    /// use sonatakit::sonata::population::AttributeValue;
    ///
    /// let values = ["1".to_string(), "2.5".to_string()];
    /// assert_eq!(AttributeValue::parse_all(&values), AttributeValue::Floats(vec![1.0, 2.5]));
    /// ```
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Self {
        if let [single] = raw {
            return Self::parse(single.as_ref());
        }
        let ints: Result<Vec<i64>, _> = raw.iter().map(|v| v.as_ref().parse::<i64>()).collect();
        if let Ok(ints) = ints {
            return AttributeValue::Ints(ints);
        }
        let floats: Result<Vec<f64>, _> = raw.iter().map(|v| v.as_ref().parse::<f64>()).collect();
        match floats {
            Ok(floats) => AttributeValue::Floats(floats),
            Err(_) => AttributeValue::Texts(raw.iter().map(|v| v.as_ref().to_string()).collect()),
        }
    }
}

/// Lock `file`, load it, apply `edit`, and save it atomically.
pub(crate) fn edit_container<T>(
    file: &Path,
    edit: impl FnOnce(&mut Container) -> CurateResult<T>,
) -> CurateResult<T> {
    let _lock = ContainerLock::acquire(file)?;
    let mut container = Container::load(file)?;
    let out = edit(&mut container)?;
    container.save(file)?;
    Ok(out)
}

/// Determine the category of a loaded container.
///
/// # Errors
///
/// Returns `Schema` if neither or both category groups are present.
pub fn category_of(container: &Container, file: &Path) -> CurateResult<Category> {
    let present: Vec<Category> = Category::ALL
        .into_iter()
        .filter(|c| container.group(c.group_name()).is_ok())
        .collect();
    match present.as_slice() {
        [category] => Ok(*category),
        [] => Err(CurateError::schema(
            file,
            "container has neither a nodes nor an edges group",
        )),
        _ => Err(CurateError::schema(
            file,
            "container has both nodes and edges groups",
        )),
    }
}

/// Fail with `Schema` unless the container is of the `expected` category.
pub(crate) fn expect_category(
    container: &Container,
    file: &Path,
    expected: Category,
) -> CurateResult<()> {
    let actual = category_of(container, file)?;
    if actual != expected {
        return Err(CurateError::schema(
            file,
            format!("expected a {} container, found {}", expected, actual),
        ));
    }
    Ok(())
}

/// Populations of a loaded container, sorted by name.
pub fn population_names_in(container: &Container, file: &Path) -> CurateResult<Vec<String>> {
    let category = category_of(container, file)?;
    Ok(container.child_names(category.group_name())?)
}

/// List the populations under the file's category group.
///
/// # Errors
///
/// Returns `Schema` if neither or both category groups are present.
pub fn get_population_names(file: &Path) -> CurateResult<Vec<String>> {
    population_names_in(&Container::load(file)?, file)
}

/// Resolve an optional population name against a loaded container.
pub fn resolve_population(
    container: &Container,
    file: &Path,
    name: Option<&str>,
) -> CurateResult<String> {
    let names = population_names_in(container, file)?;
    match name {
        Some(name) => {
            if names.iter().any(|n| n == name) {
                Ok(name.to_string())
            } else {
                Err(CurateError::not_found("population", name))
            }
        }
        None => match names.len() {
            1 => Ok(names.into_iter().next().unwrap_or_default()),
            0 => Err(CurateError::schema(file, "container holds no population")),
            _ => Err(CurateError::AmbiguousPopulation {
                path: file.to_path_buf(),
                candidates: names,
            }),
        },
    }
}

/// Resolve to a single population name.
///
/// # Errors
///
/// - `NotFound` if `name` is given but absent
/// - `AmbiguousPopulation` if `name` is omitted and several exist
pub fn get_population_name(file: &Path, name: Option<&str>) -> CurateResult<String> {
    resolve_population(&Container::load(file)?, file, name)
}

/// Rename a population inside a loaded container.
pub(crate) fn rename_in(
    container: &mut Container,
    file: &Path,
    new_name: &str,
    old_name: Option<&str>,
) -> CurateResult<String> {
    let new_name = PopulationName::new(new_name)?;
    let category = category_of(container, file)?;
    let old_name = resolve_population(container, file, old_name)?;
    if old_name == new_name.as_str() {
        return Ok(old_name);
    }
    let destination = paths::population(category, new_name.as_str());
    if container.contains(&destination) {
        return Err(CurateError::DuplicatePopulation {
            category: category.to_string(),
            name: new_name.to_string(),
        });
    }
    container.move_node(&paths::population(category, &old_name), &destination)?;
    tracing::debug!(%category, from = %old_name, to = %new_name, "renamed population");
    Ok(new_name.into())
}

/// Rename a population, resolving `old_name` when omitted.
///
/// Returns the new name.
pub fn rename_population(
    file: &Path,
    new_name: &str,
    old_name: Option<&str>,
) -> CurateResult<String> {
    edit_container(file, |c| rename_in(c, file, new_name, old_name))
}

/// Number of elements in a population.
///
/// Taken from the type-id column, then (for edges) `source_node_id`, then
/// the first column of group `0`.
pub fn population_size(
    container: &Container,
    category: Category,
    population: &str,
) -> CurateResult<usize> {
    let mut candidates = vec![paths::population_column(
        category,
        population,
        category.type_id_column(),
    )];
    if category == Category::Edges {
        candidates.push(paths::population_column(
            category,
            population,
            paths::SOURCE_NODE_ID,
        ));
    }
    for path in &candidates {
        if let Ok(ds) = container.dataset(path) {
            return Ok(ds.rows());
        }
    }
    if let Some(rows) = first_column_rows(container, category, population, paths::DEFAULT_GROUP) {
        return Ok(rows);
    }
    Err(CurateError::invariant(
        paths::population(category, population),
        "cannot determine population size",
    ))
}

/// Rows of the first attribute column in a group, skipping the Library.
fn first_column_rows(
    container: &Container,
    category: Category,
    population: &str,
    group_id: &str,
) -> Option<usize> {
    let group = container
        .group(&paths::group(category, population, group_id))
        .ok()?;
    group.children.values().find_map(|node| match node {
        Node::Dataset(ds) => Some(ds.rows()),
        Node::Group(_) => None,
    })
}

/// Number of rows in a population group.
pub fn group_size(
    container: &Container,
    category: Category,
    population: &str,
    group_id: &str,
) -> CurateResult<usize> {
    match first_column_rows(container, category, population, group_id) {
        Some(rows) => Ok(rows),
        None => population_size(container, category, population),
    }
}

/// Per-row group address of a population: `(group id, row in group)`.
///
/// Without group-id/group-index columns every row lives in group `0` at its
/// own position.
pub(crate) fn group_addresses(
    container: &Container,
    category: Category,
    population: &str,
    rows: usize,
) -> CurateResult<Vec<(String, usize)>> {
    let column = |name: &str| -> CurateResult<Option<Vec<i64>>> {
        let path = paths::population_column(category, population, name);
        match container.dataset(&path) {
            Ok(ds) => ds
                .as_ints()
                .map(|v| Some(v.to_vec()))
                .ok_or_else(|| CurateError::invariant(path, "expected an integer column")),
            Err(_) => Ok(None),
        }
    };
    let group_ids = column(paths::group_id_column(category))?;
    let group_index = column(paths::group_index_column(category))?;

    (0..rows)
        .map(|row| -> CurateResult<(String, usize)> {
            let group = group_ids
                .as_ref()
                .and_then(|g| g.get(row))
                .map(|g| g.to_string())
                .unwrap_or_else(|| paths::DEFAULT_GROUP.to_string());
            let index = match &group_index {
                Some(idx) => idx
                    .get(row)
                    .and_then(|&i| usize::try_from(i).ok())
                    .ok_or_else(|| {
                        CurateError::invariant(
                            paths::population_column(
                                category,
                                population,
                                paths::group_index_column(category),
                            ),
                            format!("invalid group index at row {}", row),
                        )
                    })?,
                None => row,
            };
            Ok((group, index))
        })
        .collect()
}

/// Restrict a population to the rows in `keep`, in that order.
///
/// Population-level columns of length `rows` are row-selected, group
/// columns are selected through each row's group address, the group-index
/// column is recomputed, and `indices` groups are dropped. Library arrays
/// are kept whole.
pub(crate) fn compact_population(
    container: &mut Container,
    category: Category,
    population: &str,
    rows: usize,
    keep: &[usize],
) -> CurateResult<()> {
    let pop_path = paths::population(category, population);
    let addresses = group_addresses(container, category, population, rows)?;
    let index_path =
        paths::population_column(category, population, paths::group_index_column(category));
    let has_group_columns = container.contains(&index_path)
        || container.contains(&paths::population_column(
            category,
            population,
            paths::group_id_column(category),
        ));

    let mut per_group: std::collections::BTreeMap<String, Vec<usize>> = Default::default();
    let mut new_index = Vec::with_capacity(keep.len());
    for &row in keep {
        let (group, index) = &addresses[row];
        let selected = per_group.entry(group.clone()).or_default();
        new_index.push(selected.len() as i64);
        selected.push(*index);
    }

    let mut group_names = Vec::new();
    for name in container.child_names(&pop_path)? {
        let path = join(&[&pop_path, &name]);
        match container.node(&path) {
            Some(Node::Dataset(ds)) if ds.rows() == rows => {
                let compacted = ds.select_rows(keep);
                container.put_dataset(&path, compacted)?;
            }
            Some(Node::Dataset(ds)) => {
                tracing::warn!(column = %path, rows = ds.rows(), expected = rows, "column length differs from population; left as is");
            }
            Some(Node::Group(_)) if name == paths::INDICES_GROUP => {
                container.remove(&path)?;
                tracing::debug!(group = %path, "removed stale indices");
            }
            Some(Node::Group(_)) => group_names.push(name),
            None => {}
        }
    }

    for group in group_names {
        let group_path = join(&[&pop_path, &group]);
        let selection = per_group.get(&group).cloned().unwrap_or_default();
        for column in container.child_names(&group_path)? {
            let path = join(&[&group_path, &column]);
            let compacted = match container.node(&path) {
                Some(Node::Dataset(ds)) => {
                    if let Some(&bad) = selection.iter().find(|&&i| i >= ds.rows()) {
                        return Err(CurateError::invariant(
                            path,
                            format!("group index {} outside {} rows", bad, ds.rows()),
                        ));
                    }
                    ds.select_rows(&selection)
                }
                _ => continue,
            };
            container.put_dataset(&path, compacted)?;
        }
    }

    if has_group_columns {
        let attrs = container
            .dataset(&index_path)
            .map(|ds| ds.attrs.clone())
            .unwrap_or_default();
        let mut index = Dataset::ints(new_index);
        index.attrs = attrs;
        container.put_dataset(&index_path, index)?;
    }
    Ok(())
}

fn broadcast<T: Clone>(
    values: Vec<T>,
    scalar: bool,
    rows: usize,
    attribute: &str,
) -> CurateResult<Vec<T>> {
    if scalar {
        let value = values.into_iter().next();
        return Ok(value.map(|v| vec![v; rows]).unwrap_or_default());
    }
    if values.len() != rows {
        return Err(CurateError::ShapeMismatch {
            attribute: attribute.to_string(),
            message: format!("{} values for a group of {} rows", values.len(), rows),
        });
    }
    Ok(values)
}

fn write_text(
    container: &mut Container,
    category: Category,
    population: &str,
    group_id: &str,
    attribute: &str,
    texts: Vec<String>,
) -> CurateResult<()> {
    let rows = texts.len();
    let library = write_categorical(container, category, population, group_id, attribute, &texts)?;
    tracing::debug!(population, group_id, attribute, rows, distinct = library.len(), "wrote categorical attribute");
    Ok(())
}

/// Write an attribute column into a population group of a loaded container.
pub(crate) fn set_attribute_in(
    container: &mut Container,
    category: Category,
    population: &str,
    group_id: &str,
    attribute: &str,
    value: AttributeValue,
    overwrite: bool,
) -> CurateResult<()> {
    if !container.contains(&paths::population(category, population)) {
        return Err(CurateError::not_found("population", population));
    }
    let rows = group_size(container, category, population, group_id)?;
    let attr_path = paths::attribute(category, population, group_id, attribute);
    let exists = container.contains(&attr_path);
    if exists && !overwrite {
        return Err(CurateError::AlreadyExists(format!("attribute '{}'", attr_path)));
    }

    let data = match value {
        AttributeValue::Text(s) => {
            let texts = broadcast(vec![s], true, rows, &attr_path)?;
            return write_text(container, category, population, group_id, attribute, texts);
        }
        AttributeValue::Texts(v) => {
            let texts = broadcast(v, false, rows, &attr_path)?;
            return write_text(container, category, population, group_id, attribute, texts);
        }
        AttributeValue::Int(i) => Data::Int(broadcast(vec![i], true, rows, &attr_path)?),
        AttributeValue::Ints(v) => Data::Int(broadcast(v, false, rows, &attr_path)?),
        AttributeValue::Float(f) => Data::Float(broadcast(vec![f], true, rows, &attr_path)?),
        AttributeValue::Floats(v) => Data::Float(broadcast(v, false, rows, &attr_path)?),
    };

    if !exists {
        container.put_dataset(&attr_path, Dataset::new(data))?;
        tracing::debug!(attribute = %attr_path, rows, "wrote numeric attribute");
        return Ok(());
    }

    if is_categorical(container, category, population, group_id, attribute) {
        return Err(CurateError::ShapeMismatch {
            attribute: attr_path,
            message: "existing attribute is categorical".into(),
        });
    }
    let existing = container.dataset_mut(&attr_path)?;
    if existing.shape != [rows] {
        return Err(CurateError::ShapeMismatch {
            attribute: attr_path,
            message: format!("existing shape {:?}, new shape [{}]", existing.shape, rows),
        });
    }
    existing.data = match (&existing.data, data) {
        (Data::Int(_), Data::Int(v)) => Data::Int(v),
        (Data::Float(_), Data::Float(v)) => Data::Float(v),
        (Data::Float(_), Data::Int(v)) => Data::Float(v.into_iter().map(|i| i as f64).collect()),
        (old, new) => {
            return Err(CurateError::ShapeMismatch {
                attribute: attr_path,
                message: format!("cannot store {} values in a {} column", new.dtype(), old.dtype()),
            })
        }
    };
    tracing::debug!(attribute = %attr_path, rows, "overwrote numeric attribute");
    Ok(())
}

/// Write an attribute column into a population group.
///
/// Text values are Library-encoded; numeric values are stored raw.
/// Existing columns are replaced only with `overwrite`, and numeric
/// replacements must match the existing shape and dtype.
///
/// # Errors
///
/// - `Schema` if `category` does not match the file
/// - `NotFound` if the population is absent
/// - `AlreadyExists` if the column exists and `overwrite` is false
/// - `ShapeMismatch` on incompatible shapes or dtypes
pub fn set_group_attribute(
    file: &Path,
    category: Category,
    population: &str,
    group_id: &str,
    attribute: &str,
    value: AttributeValue,
    overwrite: bool,
) -> CurateResult<()> {
    edit_container(file, |c| {
        expect_category(c, file, category)?;
        set_attribute_in(c, category, population, group_id, attribute, value, overwrite)
    })
}

/// Backfill a missing type-id column inside a loaded container.
pub(crate) fn add_type_id_in(
    container: &mut Container,
    file: &Path,
    population: &str,
) -> CurateResult<bool> {
    let category = category_of(container, file)?;
    if !container.contains(&paths::population(category, population)) {
        return Err(CurateError::not_found("population", population));
    }
    let path = paths::population_column(category, population, category.type_id_column());
    if container.contains(&path) {
        tracing::debug!(column = %path, "type-id column already present");
        return Ok(false);
    }
    let rows = population_size(container, category, population)?;
    container.put_dataset(&path, Dataset::ints(vec![TYPE_ID_SENTINEL; rows]))?;
    tracing::debug!(column = %path, rows, "backfilled type-id column");
    Ok(true)
}

/// Backfill a missing `node_type_id`/`edge_type_id` column with −1.
///
/// Returns whether a column was added.
pub fn add_type_id(file: &Path, population: &str) -> CurateResult<bool> {
    edit_container(file, |c| add_type_id_in(c, file, population))
}
