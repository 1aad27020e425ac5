//! Reminder message templates.

/// Subject and plain-text body of a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub subject: String,
    pub body: String,
}

const SIGNATURE: &str = "Best regards,\nSafety Pass Management System";

/// Render the reminder for `employee_name`'s `pass_name` pass.
///
/// One day out gets the urgent "expires tomorrow" wording.
pub fn render_reminder(
    employee_name: &str,
    pass_name: &str,
    days_remaining: i64,
) -> ReminderMessage {
    let subject = format!("Safety Pass Expiry Reminder - {pass_name}");
    let body = if days_remaining == 1 {
        format!(
            "Dear {employee_name},\n\n\
             This is an urgent reminder that your safety pass '{pass_name}' will expire TOMORROW.\n\n\
             Please ensure you renew your pass before it expires to avoid any disruption to your site access.\n\n\
             If you have any questions, please contact your manager immediately.\n\n\
             {SIGNATURE}"
        )
    } else {
        format!(
            "Dear {employee_name},\n\n\
             This is a reminder that your safety pass '{pass_name}' will expire in {days_remaining} days.\n\n\
             Please plan to renew your pass in advance to ensure uninterrupted site access.\n\n\
             If you have any questions, please contact your manager.\n\n\
             {SIGNATURE}"
        )
    };
    ReminderMessage { subject, body }
}
