use super::tables::ALL_TABLES;
use super::types::TableSchema;
use crate::error::{QuakeError, Result};
use std::collections::{HashMap, HashSet};

/// Orders tables so that foreign-key parents are created before children
pub struct DependencyResolver {
    /// Map of table name -> tables it depends on
    deps: HashMap<&'static str, HashSet<&'static str>>,
    tables: HashMap<&'static str, &'static TableSchema>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::for_tables(ALL_TABLES)
    }

    pub fn for_tables(tables: &[&'static TableSchema]) -> Self {
        let deps = tables
            .iter()
            .map(|table| (table.name, table.dependencies()))
            .collect();
        let tables = tables.iter().map(|table| (table.name, *table)).collect();

        Self { deps, tables }
    }

    /// All known tables in dependency order (parents before children)
    pub fn creation_order(&self) -> Result<Vec<&'static TableSchema>> {
        let mut names: Vec<&'static str> = self.deps.keys().copied().collect();
        // Stable output regardless of hash order
        names.sort_unstable();

        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut temp_visited = HashSet::new();

        for name in names {
            self.visit(name, &mut visited, &mut temp_visited, &mut result)?;
        }

        Ok(result)
    }

    fn visit(
        &self,
        name: &'static str,
        visited: &mut HashSet<&'static str>,
        temp_visited: &mut HashSet<&'static str>,
        result: &mut Vec<&'static TableSchema>,
    ) -> Result<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if temp_visited.contains(name) {
            return Err(QuakeError::schema(format!(
                "circular foreign key dependency involving {name}"
            )));
        }

        temp_visited.insert(name);

        if let Some(deps) = self.deps.get(name) {
            let mut deps: Vec<_> = deps.iter().copied().collect();
            deps.sort_unstable();
            for dep in deps {
                if dep == name {
                    continue;
                }
                if !self.deps.contains_key(dep) {
                    return Err(QuakeError::schema(format!(
                        "{name} references unknown table {dep}"
                    )));
                }
                self.visit(dep, visited, temp_visited, result)?;
            }
        }

        temp_visited.remove(name);
        visited.insert(name);

        if let Some(table) = self.tables.get(name).copied() {
            result.push(table);
        }

        Ok(())
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}
