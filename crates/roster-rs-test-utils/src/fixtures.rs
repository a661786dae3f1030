use roster_rs_protocol::Document;
use serde_json::{Value, json};

/// JSON object literal as a record; non-objects become empty records.
pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap_or_default()
}

/// Five employees across Sales, Engineering and HR.
pub fn sample_employees() -> Vec<Document> {
    vec![
        doc(json!({
            "employee_id": "EMP000101", "name": "Ada Park", "department": "Sales",
            "job_title": "Account Executive", "location": "Berlin", "hire_date": "2019-04-01",
            "salary_usd": 82000, "performance_score": 4.6, "sales_achieved": 410000, "region": "EMEA"
        })),
        doc(json!({
            "employee_id": "EMP000102", "name": "Bo Chen", "department": "Sales",
            "job_title": "Sales Manager", "location": "Remote", "hire_date": "2016-09-12",
            "salary_usd": 98000, "performance_score": 3.8, "sales_achieved": 290000, "region": "APAC"
        })),
        doc(json!({
            "employee_id": "EMP000103", "name": "Cleo Diaz", "department": "Engineering",
            "job_title": "Backend Engineer", "location": "Lisbon", "hire_date": "2021-01-18",
            "salary_usd": 105000, "performance_score": 4.2
        })),
        doc(json!({
            "employee_id": "EMP000104", "name": "Dev Iyer", "department": "Engineering",
            "job_title": "Data Engineer", "location": "Remote", "hire_date": "2020-06-01",
            "salary_usd": 99000, "performance_score": 3.4
        })),
        doc(json!({
            "employee_id": "EMP000105", "name": "Eli Novak", "department": "HR",
            "job_title": "HR Partner", "location": "Berlin", "hire_date": "2018-11-05",
            "salary_usd": 71000, "performance_score": 4.0
        })),
    ]
}
