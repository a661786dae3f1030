//! Static description of the employee record fields and their synonyms.

use std::fmt;

/// Value type of a catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Date,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Date => "date (YYYY-MM-DD)",
        })
    }
}

/// Semantic grouping of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    Identifiers,
    Dates,
    Financials,
    Metrics,
    Sales,
    WorkStyle,
}

impl FieldCategory {
    pub const ALL: [FieldCategory; 6] = [
        FieldCategory::Identifiers,
        FieldCategory::Dates,
        FieldCategory::Financials,
        FieldCategory::Metrics,
        FieldCategory::Sales,
        FieldCategory::WorkStyle,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FieldCategory::Identifiers => "Identifiers",
            FieldCategory::Dates => "Dates",
            FieldCategory::Financials => "Financials",
            FieldCategory::Metrics => "Metrics",
            FieldCategory::Sales => "Sales",
            FieldCategory::WorkStyle => "Work style",
        }
    }
}

/// One recognized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub category: FieldCategory,
    pub field_type: FieldType,
    pub description: &'static str,
}

const fn field(
    name: &'static str,
    category: FieldCategory,
    field_type: FieldType,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        category,
        field_type,
        description,
    }
}

use FieldCategory::*;

const EMPLOYEE_FIELDS: &[FieldSpec] = &[
    field("employee_id", Identifiers, FieldType::String, "unique id, EMP followed by 6 digits"),
    field("name", Identifiers, FieldType::String, "full name"),
    field("email", Identifiers, FieldType::String, "work email address"),
    field("department", Identifiers, FieldType::String, "e.g. Sales, Engineering, HR, Finance, Marketing"),
    field("job_title", Identifiers, FieldType::String, "role within the department"),
    field("location", Identifiers, FieldType::String, "office city or Remote"),
    field("hire_date", Dates, FieldType::Date, "first day of employment"),
    field("last_review_date", Dates, FieldType::Date, "date of the latest performance review"),
    field("termination_date", Dates, FieldType::Date, "last day of employment, absent for current staff"),
    field("salary_usd", Financials, FieldType::Number, "annual base salary in USD"),
    field("bonus_usd", Financials, FieldType::Number, "annual bonus in USD"),
    field("stock_options", Financials, FieldType::Number, "granted stock options"),
    field("performance_score", Metrics, FieldType::Number, "latest review score, 1.0 to 5.0"),
    field("engagement_score", Metrics, FieldType::Number, "survey engagement score, 1 to 10"),
    field("satisfaction_score", Metrics, FieldType::Number, "survey satisfaction score, 1 to 10"),
    field("overtime_hours", Metrics, FieldType::Number, "overtime hours this year"),
    field("sick_days", Metrics, FieldType::Number, "sick days taken this year"),
    field("sales_target", Sales, FieldType::Number, "annual sales target in USD"),
    field("sales_achieved", Sales, FieldType::Number, "sales closed this year in USD"),
    field("deals_closed", Sales, FieldType::Number, "number of deals closed this year"),
    field("region", Sales, FieldType::String, "sales region, e.g. North America, EMEA, APAC"),
    field("work_mode", WorkStyle, FieldType::String, "Onsite, Hybrid or Remote"),
    field("weekly_hours", WorkStyle, FieldType::Number, "contracted hours per week"),
    field("training_hours", WorkStyle, FieldType::Number, "training hours completed this year"),
];

const EMPLOYEE_SYNONYMS: &[(&str, &str)] = &[
    ("id", "employee_id"),
    ("employee id", "employee_id"),
    ("full name", "name"),
    ("mail", "email"),
    ("dept", "department"),
    ("team", "department"),
    ("division", "department"),
    ("title", "job_title"),
    ("role", "job_title"),
    ("position", "job_title"),
    ("office", "location"),
    ("city", "location"),
    ("start date", "hire_date"),
    ("joined", "hire_date"),
    ("review date", "last_review_date"),
    ("exit date", "termination_date"),
    ("salary", "salary_usd"),
    ("income", "salary_usd"),
    ("pay", "salary_usd"),
    ("compensation", "salary_usd"),
    ("wage", "salary_usd"),
    ("bonus", "bonus_usd"),
    ("options", "stock_options"),
    ("equity", "stock_options"),
    ("rating", "performance_score"),
    ("score", "performance_score"),
    ("performance", "performance_score"),
    ("engagement", "engagement_score"),
    ("satisfaction", "satisfaction_score"),
    ("overtime", "overtime_hours"),
    ("sick leave", "sick_days"),
    ("quota", "sales_target"),
    ("target", "sales_target"),
    ("revenue", "sales_achieved"),
    ("deals", "deals_closed"),
    ("territory", "region"),
    ("remote", "work_mode"),
    ("hours", "weekly_hours"),
    ("training", "training_hours"),
];

/// Field and synonym catalog handed to the classifier.
#[derive(Debug, Clone, Copy)]
pub struct SchemaCatalog {
    fields: &'static [FieldSpec],
    synonyms: &'static [(&'static str, &'static str)],
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::employees()
    }
}

impl SchemaCatalog {
    /// Catalog of the employee record store.
    pub const fn employees() -> Self {
        Self {
            fields: EMPLOYEE_FIELDS,
            synonyms: EMPLOYEE_SYNONYMS,
        }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Look up a field by canonical name.
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn fields_in(&self, category: FieldCategory) -> Vec<&'static FieldSpec> {
        self.fields
            .iter()
            .filter(|spec| spec.category == category)
            .collect()
    }

    /// Map a user term to a canonical field name. Unknown terms yield `None`.
    pub fn resolve(&self, term: &str) -> Option<&'static str> {
        let normalized = term.trim().to_lowercase().replace(['-', '_'], " ");
        if let Some(spec) = self
            .fields
            .iter()
            .find(|spec| spec.name.replace('_', " ") == normalized)
        {
            return Some(spec.name);
        }
        self.synonyms
            .iter()
            .find(|(synonym, _)| *synonym == normalized)
            .map(|(_, canonical)| *canonical)
    }

    /// Catalog as prompt text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for category in FieldCategory::ALL {
            let fields = self.fields_in(category);
            if fields.is_empty() {
                continue;
            }
            out.push_str(&format!("{}:\n", category.label()));
            for spec in fields {
                out.push_str(&format!(
                    "- {} ({}): {}\n",
                    spec.name, spec.field_type, spec.description
                ));
            }
        }
        out.push_str("Synonyms:\n");
        for (synonym, canonical) in self.synonyms {
            out.push_str(&format!("- \"{synonym}\" -> {canonical}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldCategory, SchemaCatalog};
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_synonyms_and_canonical_names() {
        let catalog = SchemaCatalog::employees();
        assert_eq!(catalog.resolve("Income"), Some("salary_usd"));
        assert_eq!(catalog.resolve("rating"), Some("performance_score"));
        assert_eq!(catalog.resolve("hire date"), Some("hire_date"));
        assert_eq!(catalog.resolve("job_title"), Some("job_title"));
        assert_eq!(catalog.resolve("favourite colour"), None);
    }

    #[test]
    fn categories_partition_the_fields() {
        let catalog = SchemaCatalog::employees();
        let total: usize = FieldCategory::ALL
            .iter()
            .map(|category| catalog.fields_in(*category).len())
            .sum();
        assert_eq!(total, catalog.fields().len());
        assert_eq!(catalog.fields_in(FieldCategory::Sales).len(), 4);
    }

    #[test]
    fn render_lists_every_field() {
        let catalog = SchemaCatalog::employees();
        let rendered = catalog.render();
        for spec in catalog.fields() {
            assert!(rendered.contains(spec.name), "missing {}", spec.name);
        }
        assert!(rendered.contains("\"pay\" -> salary_usd"));
    }
}
