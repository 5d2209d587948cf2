//! HTML templates for the certificate document and the notification email.
//!
//! Both functions are pure: the same input always yields the same markup.

use chrono::{DateTime, Utc};

use crate::CertificateJob;

/// Values printed on a certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateDetails<'a> {
    pub quiz_title: &'a str,
    pub student_name: &'a str,
    pub team_name: &'a str,
    pub completed_at: DateTime<Utc>,
    pub score: f64,
}

impl<'a> From<&'a CertificateJob> for CertificateDetails<'a> {
    fn from(job: &'a CertificateJob) -> Self {
        Self {
            quiz_title: &job.quiz_title,
            student_name: &job.student_name,
            team_name: &job.team_name,
            completed_at: job.completed_at,
            score: job.score,
        }
    }
}

/// Subject and HTML body of an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Escape text for inclusion in HTML element content or a quoted attribute.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Date as printed on the certificate, e.g. `March 4, 2025`.
pub fn award_date(completed_at: DateTime<Utc>) -> String {
    completed_at.format("%B %-d, %Y").to_string()
}

/// Render the landscape A4 certificate document.
pub fn certificate_html(details: &CertificateDetails<'_>) -> String {
    let student_name = escape_html(details.student_name);
    let quiz_title = escape_html(details.quiz_title);
    let team_name = escape_html(details.team_name);
    let date = award_date(details.completed_at);
    let score = details.score;

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Certificate of Achievement</title>
<style>
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{
    font-family: 'Helvetica', Arial, sans-serif;
    background-color: #ffffff;
    display: flex;
    justify-content: center;
    align-items: center;
  }}
  .certificate {{
    width: 297mm;
    height: 210mm;
    background-color: #f8f4e9;
    position: relative;
    overflow: hidden;
  }}
  .watermark {{
    position: absolute;
    top: 50%;
    left: 50%;
    transform: translate(-50%, -50%) rotate(-45deg);
    font-size: 60px;
    font-weight: bold;
    color: #bdc3c7;
    opacity: 0.08;
    white-space: nowrap;
  }}
  .border {{
    position: absolute;
    inset: 30px;
    border: 4px solid #d4af37;
    border-radius: 10px;
  }}
  .inner-border {{
    position: absolute;
    inset: 50px;
    border: 2px dashed #f9d71c;
    border-radius: 8px;
  }}
  .content {{
    position: relative;
    z-index: 1;
    height: 100%;
    display: flex;
    align-items: center;
    justify-content: space-between;
    padding: 0 80px;
  }}
  .left, .right {{
    flex: 1;
    display: flex;
    flex-direction: column;
    align-items: center;
    justify-content: center;
    text-align: center;
  }}
  .left {{ padding-right: 40px; }}
  .right {{ padding-left: 40px; }}
  .title {{
    font-size: 36px;
    font-weight: bold;
    color: #2c3e50;
    letter-spacing: 2px;
  }}
  .body-text {{ font-size: 16px; color: #34495e; line-height: 1.8; margin-bottom: 15px; }}
  .student-name {{
    display: inline-block;
    font-size: 32px;
    font-weight: bold;
    color: #c0392b;
    margin: 15px 0;
    padding-bottom: 8px;
    border-bottom: 2px solid #bdc3c7;
    text-transform: uppercase;
    letter-spacing: 1px;
  }}
  .quiz-title {{ font-size: 22px; font-weight: bold; color: #2980b9; margin: 15px 0; }}
  .team {{ font-size: 14px; color: #7f8c8d; margin: 8px 0; }}
  .performance {{ font-size: 18px; color: #34495e; margin: 12px 0; }}
  .score {{ color: #27ae60; font-weight: bold; }}
  .date {{ font-size: 14px; color: #7f8c8d; margin-top: 20px; }}
</style>
</head>
<body>
  <div class="certificate">
    <div class="watermark">CERTIFICATE</div>
    <div class="border"></div>
    <div class="inner-border"></div>
    <div class="content">
      <div class="left">
        <h1 class="title">Certificate of Achievement</h1>
      </div>
      <div class="right">
        <p class="body-text">This is to certify that</p>
        <div class="student-name" id="studentName">{student_name}</div>
        <p class="body-text">has successfully completed the</p>
        <div class="quiz-title" id="quizName">{quiz_title}</div>
        <p class="team" id="teamName">Team: {team_name}</p>
        <p class="performance">with a score of <span class="score" id="percentage">{score}</span>%</p>
        <p class="date" id="date">Awarded on: {date}</p>
      </div>
    </div>
  </div>
</body>
</html>
"#
    )
}

/// Build the notification email pointing the student at their certificate.
pub fn certificate_email(student_name: &str, quiz_title: &str, certificate_url: &str) -> EmailContent {
    let student_name = escape_html(student_name);
    let quiz_title_html = escape_html(quiz_title);
    let url = escape_html(certificate_url);

    let html = format!(
        r#"<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <p>Dear {student_name},</p>
  <p>Congratulations on participating in <strong>{quiz_title_html}</strong>!</p>
  <p>Here is your certificate of participation: <a href="{url}">Certificate</a>.</p>
  <br>
  <p>Keep shining,<br><strong>The Quiz Team</strong></p>
</body>
</html>
"#
    );

    EmailContent {
        subject: format!("Your certificate for {quiz_title} is here!"),
        html,
    }
}
