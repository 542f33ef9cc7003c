// src/main.rs

use chrono::{Datelike, Duration, Local};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    username: String,
    display_name: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct DayResponse {
    date: String,
    label: String,
    is_holiday: bool,
    hours: String,
    tasks: String,
    vacation: String,
}

#[derive(Debug, Deserialize)]
struct WeekResponse {
    week_start: String,
    days: Vec<DayResponse>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url =
        std::env::var("TIMESHEET_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health_response = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health_response);

    // Test 2: Protected route without a token
    println!("\n🔍 Testing week endpoint without a token...");
    let anonymous = client.get(format!("{}/api/week", base_url)).send().await?;
    println!("Anonymous status (expect 401): {}", anonymous.status());

    let (username, password) = prompt_for_credentials()?;
    if username.is_empty() {
        println!("\nNo username given; skipping session tests.");
        println!("\n✅ Testing complete!");
        return Ok(());
    }

    // Test 3: Login
    println!("\n🔍 Logging in as {}...", username);
    let login_response = client
        .post(format!("{}/api/login", base_url))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;
    if !login_response.status().is_success() {
        println!("Login failed: {}", login_response.text().await?);
        return Ok(());
    }
    let session = login_response.json::<SessionResponse>().await?;
    println!(
        "Logged in as {} ({}) with role {}",
        session.display_name, session.username, session.role
    );

    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", session.token))?,
    );

    // Test 4: Load last week's form
    let today = Local::now().date_naive();
    let last_week = today - Duration::days(7 + today.weekday().num_days_from_monday() as i64);
    println!("\n🔍 Loading week form for {}...", last_week);
    let week = client
        .get(format!("{}/api/week?date={}", base_url, last_week))
        .headers(headers.clone())
        .send()
        .await?
        .json::<WeekResponse>()
        .await?;
    println!("Week starting {}:", week.week_start);
    for day in &week.days {
        println!(
            "  {} [{}] hours={} vacation={} tasks={:?}{}",
            day.label,
            day.date,
            day.hours,
            day.vacation,
            day.tasks,
            if day.is_holiday { " (holiday)" } else { "" }
        );
    }

    // Test 5: Submit the week
    println!("\n🔍 Submitting 8 hours per day for week {}...", week.week_start);
    let entries: Vec<Value> = week
        .days
        .iter()
        .map(|day| json!({ "date": day.date, "hours": 8, "tasks": "Smoke test", "vacation": 0 }))
        .collect();
    let submit_response = client
        .post(format!("{}/api/week", base_url))
        .headers(headers.clone())
        .json(&json!({ "week_start": week.week_start, "entries": entries }))
        .send()
        .await?;
    println!("Submit status: {}", submit_response.status());
    println!("Submit outcome: {}", submit_response.text().await?);

    // Test 6: History
    println!("\n🔍 Fetching history...");
    let history = client
        .get(format!("{}/api/history", base_url))
        .headers(headers.clone())
        .send()
        .await?
        .json::<Value>()
        .await?;
    let count = history.as_object().map(|m| m.len()).unwrap_or(0);
    println!("History holds {} dated entries", count);

    // Test 7: Admin summaries (403 for non-admins)
    println!("\n🔍 Fetching weekly summaries...");
    let summaries = client
        .get(format!("{}/api/admin/summaries", base_url))
        .headers(headers.clone())
        .send()
        .await?;
    println!("Summaries status: {}", summaries.status());
    println!("Summaries body: {}", summaries.text().await?);

    // Test 8: Logout
    println!("\n🔍 Logging out...");
    let logout = client
        .post(format!("{}/api/logout", base_url))
        .headers(headers)
        .send()
        .await?;
    println!("Logout status (expect 204): {}", logout.status());

    println!("\n✅ Testing complete!");

    Ok(())
}

fn prompt_for_credentials() -> Result<(String, String), Box<dyn Error>> {
    println!("Enter username (press Enter to skip session tests):");
    let mut username = String::new();
    std::io::stdin().read_line(&mut username)?;
    let username = username.trim().to_string();
    if username.is_empty() {
        return Ok((username, String::new()));
    }
    println!("Enter password:");
    let mut password = String::new();
    std::io::stdin().read_line(&mut password)?;
    Ok((username, password.trim_end_matches(['\r', '\n']).to_string()))
}
