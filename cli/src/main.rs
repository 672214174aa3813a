#![warn(clippy::nursery, clippy::pedantic)]
#![deny(unsafe_code)]

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use atty::Stream;
use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::ProgressBar;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use rpassword::prompt_password;

use pastegate_common::api::{ErrorResponse, ListResponse, PasteResponse};
use pastegate_common::unlock::{GateConfig, LoadOutcome, UnlockMachine, UnlockState};
use pastegate_common::{language, paste_url, CreatePasteRequest, Url, API_ENDPOINT};

#[derive(Parser)]
struct Opts {
    #[clap(subcommand)]
    action: Action,
}

#[derive(Parser)]
enum Action {
    Upload {
        /// The pastegate instance to upload data to.
        url: Url,
        /// Protect the paste with a password, prompted interactively.
        #[clap(short, long)]
        password: bool,
        #[clap(short, long)]
        title: Option<String>,
        /// Language tag; detected from the file when omitted.
        #[clap(short, long)]
        language: Option<String>,
        /// Keep the paste out of public listings.
        #[clap(long)]
        private: bool,
        /// Expiry timestamp, RFC 3339.
        #[clap(short, long)]
        expires_at: Option<DateTime<Utc>>,
        path: PathBuf,
    },
    Download {
        /// The pastegate instance to download from.
        url: Url,
        /// The paste to download.
        id: String,
        /// Seconds to hold the countdown gate before revealing content.
        #[clap(long, default_value_t = 0)]
        wait: u32,
        /// Confirmation prompts required before revealing content.
        #[clap(long, default_value_t = 0)]
        steps: u8,
    },
    List {
        url: Url,
        #[clap(long, default_value_t = 1)]
        page: u64,
        #[clap(long, default_value_t = 10)]
        limit: u64,
        #[clap(long)]
        search: Option<String>,
        #[clap(long)]
        language: Option<String>,
    },
    Delete {
        url: Url,
        id: String,
    },
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    match opts.action {
        Action::Upload {
            url,
            password,
            title,
            language,
            private,
            expires_at,
            path,
        } => handle_upload(&url, password, title, language, private, expires_at, &path),
        Action::Download {
            url,
            id,
            wait,
            steps,
        } => handle_download(&url, &id, wait, steps),
        Action::List {
            url,
            page,
            limit,
            search,
            language,
        } => handle_list(&url, page, limit, search, language),
        Action::Delete { url, id } => handle_delete(&url, &id),
    }?;

    Ok(())
}

fn api_path(base: &Url, rest: &str) -> Result<Url> {
    base.join(&format!(
        "{}/{}",
        API_ENDPOINT.trim_start_matches('/'),
        rest
    ))
    .context("Failed to build API URL")
}

fn response_error(res: reqwest::blocking::Response) -> String {
    res.json::<ErrorResponse>()
        .map_or_else(|_| "unknown error".to_owned(), |body| body.error)
}

#[allow(clippy::fn_params_excessive_bools)]
fn handle_upload(
    url: &Url,
    password: bool,
    title: Option<String>,
    language: Option<String>,
    private: bool,
    expires_at: Option<DateTime<Utc>>,
    path: &PathBuf,
) -> Result<()> {
    let content = String::from_utf8(std::fs::read(path)?)
        .context("Only UTF-8 encoded files can be uploaded")?;
    if content.is_empty() {
        bail!("Refusing to upload an empty paste");
    }

    let password = if password {
        Some(prompt_password("Please set the password for this paste: ")?)
    } else {
        None
    };

    let filename = path.file_name().and_then(|name| name.to_str());
    let language =
        language.unwrap_or_else(|| language::detect(&content, filename).to_owned());

    let request = CreatePasteRequest {
        title,
        content,
        language: Some(language),
        visibility: !private,
        protection: password.is_some(),
        password,
        expires_at,
        owner_id: None,
    };

    let res = Client::new()
        .post(api_path(url, "pastes")?)
        .json(&request)
        .send()
        .context("Request to server failed")?;

    if res.status() != StatusCode::OK {
        bail!("Upload failed: {}", response_error(res));
    }

    let body: PasteResponse = res.json().context("Malformed server response")?;
    println!("{}", paste_url(url, &body.data.id)?);

    Ok(())
}

fn handle_download(url: &Url, id: &str, wait: u32, steps: u8) -> Result<()> {
    let client = Client::new();
    let endpoint = api_path(url, &format!("pastes/{}", id))?;
    let mut machine = UnlockMachine::new(GateConfig {
        wait_seconds: wait,
        interaction_steps: steps,
    });
    let mut paste = None;

    let res = client
        .get(endpoint.clone())
        .send()
        .context("Failed to get paste")?;
    match res.status() {
        StatusCode::OK => {
            let body: PasteResponse = res.json().context("Malformed server response")?;
            paste = Some(body.data);
            machine.load(LoadOutcome::Open);
        }
        StatusCode::UNAUTHORIZED => machine.load(LoadOutcome::PasswordRequired),
        _ => machine.load(LoadOutcome::Failed),
    }

    loop {
        match machine.state().clone() {
            UnlockState::Init | UnlockState::Revealed => break,
            UnlockState::Failed => bail!("Paste not found or failed to load"),
            UnlockState::PasswordGate { error } => {
                if let Some(error) = error {
                    eprintln!("{}", error);
                }
                let password =
                    prompt_password("Please enter the password to access this paste: ")?;
                let res = client
                    .get(endpoint.clone())
                    .query(&[("password", password.as_str())])
                    .send()
                    .context("Failed to get paste")?;
                if res.status() == StatusCode::OK {
                    let body: PasteResponse =
                        res.json().context("Malformed server response")?;
                    paste = Some(body.data);
                    machine.submit_password(Ok(()));
                } else {
                    machine.submit_password(Err("Invalid password".to_owned()));
                }
            }
            UnlockState::WaitGate { remaining } => {
                eprintln!("Content unlocks in {} seconds", remaining);
                let bar = ProgressBar::new(u64::from(remaining));
                while matches!(machine.state(), UnlockState::WaitGate { .. }) {
                    thread::sleep(Duration::from_secs(1));
                    machine.tick();
                    bar.inc(1);
                }
                bar.finish_and_clear();
            }
            UnlockState::InteractionGate {
                completed,
                required,
            } => {
                eprint!(
                    "Press enter to continue ({}/{}): ",
                    completed + 1,
                    required
                );
                std::io::stderr().flush()?;
                let mut line = String::new();
                std::io::stdin().lock().read_line(&mut line)?;
                machine.advance_interaction();
            }
        }
    }

    let paste = paste.ok_or_else(|| anyhow!("Paste content missing after unlock"))?;

    if machine.take_view_trigger() {
        // Best effort; the content is shown either way.
        let view = api_path(url, &format!("pastes/{}/view", id))?;
        if let Err(e) = client.post(view).send() {
            eprintln!("Failed to record view: {}", e);
        }
    }

    if atty::is(Stream::Stdout) {
        println!("{}", paste.content);
    } else {
        std::io::stdout().write_all(paste.content.as_bytes())?;
    }

    if let Some(expires) = paste.expires_at {
        eprintln!("This paste expires at {}.", expires.to_rfc3339());
    }

    Ok(())
}

fn handle_list(
    url: &Url,
    page: u64,
    limit: u64,
    search: Option<String>,
    language: Option<String>,
) -> Result<()> {
    let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
    if let Some(search) = search {
        query.push(("search", search));
    }
    if let Some(language) = language {
        query.push(("language", language));
    }

    let res = Client::new()
        .get(api_path(url, "pastes")?)
        .query(&query)
        .send()
        .context("Request to server failed")?;
    if res.status() != StatusCode::OK {
        bail!("Listing failed: {}", response_error(res));
    }

    let body: ListResponse = res.json().context("Malformed server response")?;
    for paste in &body.data {
        println!(
            "{}  {:<12}  {:>6} views  {}",
            paste.id,
            paste.language.as_deref().unwrap_or("-"),
            paste.views,
            paste.title.as_deref().unwrap_or("(untitled)"),
        );
    }
    eprintln!(
        "page {}/{} ({} pastes total)",
        body.pagination.page, body.pagination.pages, body.pagination.total
    );

    Ok(())
}

fn handle_delete(url: &Url, id: &str) -> Result<()> {
    let res = Client::new()
        .delete(api_path(url, &format!("pastes/{}", id))?)
        .send()
        .context("Request to server failed")?;
    if res.status() != StatusCode::OK {
        bail!("Delete failed: {}", response_error(res));
    }

    eprintln!("Deleted {}", id);
    Ok(())
}
