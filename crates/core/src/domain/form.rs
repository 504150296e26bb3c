use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::application::FormData;
use crate::domain::folder::FolderId;
use crate::domain::principal::UserId;
use crate::domain::string_id;
use crate::errors::DomainError;

string_id!(FormId);
string_id!(FieldId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Checkbox,
    Radio,
    File,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub id: FieldId,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FormFieldType,
    pub required: bool,
    pub options: Option<Vec<String>>,
    pub default_value: Option<serde_json::Value>,
    pub order: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewFormField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FormFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    pub order: u32,
}

impl NewFormField {
    fn into_field(self) -> FormField {
        FormField {
            id: FieldId::generate(),
            name: self.name,
            label: self.label,
            field_type: self.field_type,
            required: self.required,
            options: self.options,
            default_value: self.default_value,
            order: self.order,
        }
    }
}

/// Reusable field definitions plus the folder the completion artifact is filed into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalForm {
    pub id: FormId,
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    pub created_by: UserId,
    pub target_folder_id: Option<FolderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalForm {
    /// Field defaults overlaid with caller-provided values. Keys that name no field are kept.
    pub fn initial_values(&self, provided: &FormData) -> FormData {
        let mut values = FormData::new();
        for field in &self.fields {
            if let Some(default) = &field.default_value {
                values.insert(field.name.clone(), default.clone());
            }
        }
        for (key, value) in provided {
            values.insert(key.clone(), value.clone());
        }
        values
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewApprovalForm {
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<NewFormField>,
    pub created_by: UserId,
    pub target_folder_id: Option<FolderId>,
}

impl NewApprovalForm {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvariantViolation("form name must not be empty".to_string()));
        }
        validate_fields(&self.fields)
    }

    pub fn into_form(self, id: FormId, now: DateTime<Utc>) -> ApprovalForm {
        ApprovalForm {
            id,
            name: self.name,
            description: self.description,
            fields: build_fields(self.fields),
            created_by: self.created_by,
            target_folder_id: self.target_folder_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_folder_id: Option<FolderId>,
    pub fields: Option<Vec<NewFormField>>,
}

impl FormUpdate {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(DomainError::InvariantViolation("form name must not be empty".to_string()));
        }
        match &self.fields {
            Some(fields) => validate_fields(fields),
            None => Ok(()),
        }
    }

    pub fn apply(self, form: &mut ApprovalForm) {
        if let Some(name) = self.name {
            form.name = name;
        }
        if let Some(description) = self.description {
            form.description = Some(description);
        }
        if let Some(target_folder_id) = self.target_folder_id {
            form.target_folder_id = Some(target_folder_id);
        }
        if let Some(fields) = self.fields {
            form.fields = build_fields(fields);
        }
    }
}

fn validate_fields(fields: &[NewFormField]) -> Result<(), DomainError> {
    let mut names = std::collections::BTreeSet::new();
    for field in fields {
        if field.name.trim().is_empty() {
            return Err(DomainError::InvariantViolation(
                "form field name must not be empty".to_string(),
            ));
        }
        if !names.insert(field.name.as_str()) {
            return Err(DomainError::InvariantViolation(format!(
                "form field `{}` is defined more than once",
                field.name
            )));
        }
    }
    Ok(())
}

fn build_fields(fields: Vec<NewFormField>) -> Vec<FormField> {
    let mut fields: Vec<FormField> = fields.into_iter().map(NewFormField::into_field).collect();
    fields.sort_by_key(|field| field.order);
    fields
}
