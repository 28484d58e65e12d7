// Editable multi-field forms (login, register, model deployment).

use smartbasket_core::models::{Credentials, NewDeployment};
use smartbasket_core::session::RegisterForm;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    /// Rendered masked.
    pub secret: bool,
}

impl FormField {
    fn text(label: &'static str) -> Self {
        FormField {
            label,
            value: String::new(),
            secret: false,
        }
    }

    fn secret(label: &'static str) -> Self {
        FormField {
            label,
            value: String::new(),
            secret: true,
        }
    }

    /// Value as it should appear on screen.
    pub fn display_value(&self) -> String {
        if self.secret {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub fields: Vec<FormField>,
    /// Index of the field receiving keystrokes.
    pub focus: usize,
    /// Inline error shown under the form.
    pub error: Option<String>,
}

impl FormState {
    fn new(fields: Vec<FormField>) -> Self {
        FormState {
            fields,
            focus: 0,
            error: None,
        }
    }

    pub fn login() -> Self {
        Self::new(vec![FormField::text("Username"), FormField::secret("Password")])
    }

    pub fn register() -> Self {
        Self::new(vec![
            FormField::text("Username"),
            FormField::text("Email"),
            FormField::secret("Password"),
            FormField::secret("Confirm Password"),
        ])
    }

    pub fn deploy() -> Self {
        Self::new(vec![
            FormField::text("Model Version"),
            FormField::text("Accuracy"),
            FormField::text("Top-3 Accuracy"),
            FormField::text("Top-5 Accuracy"),
        ])
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.value.as_str()).unwrap_or("")
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn push_char(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.pop();
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.value(0).trim().to_string(),
            password: self.value(1).to_string(),
        }
    }

    pub fn register_form(&self) -> RegisterForm {
        RegisterForm {
            username: self.value(0).to_string(),
            email: self.value(1).to_string(),
            password: self.value(2).to_string(),
            confirm_password: self.value(3).to_string(),
        }
    }

    /// Parse the deployment form. Metrics accept either a fraction
    /// (`0.82`) or a percentage (`82`), stored as a fraction.
    pub fn deployment(&self) -> Result<NewDeployment, String> {
        let version = self.value(0).trim();
        if version.is_empty() {
            return Err("Model version is required".to_string());
        }
        let accuracy = parse_metric(&self.fields[1])?;
        let top3 = parse_metric(&self.fields[2])?;
        let top5 = parse_metric(&self.fields[3])?;
        Ok(NewDeployment::with_accuracies(
            version.to_string(),
            accuracy,
            top3,
            top5,
        ))
    }
}

fn parse_metric(field: &FormField) -> Result<f64, String> {
    let raw = field.value.trim();
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("{} must be a number", field.label))?;
    let fraction = if value > 1.0 { value / 100.0 } else { value };
    if !(0.0..=1.0).contains(&fraction) {
        return Err(format!("{} must be between 0 and 100%", field.label));
    }
    Ok(fraction)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
