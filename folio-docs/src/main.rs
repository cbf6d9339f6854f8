use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use folio_core::{FolioClient, UploadFile};
use folio_docs::{DocsConfig, DocumentHub, Filter, logger};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Folders,
    Files(Option<String>),
    Upload {
        folder_id: String,
        description: String,
        paths: Vec<PathBuf>,
    },
    Delete(String),
    Help,
}

fn parse_command<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };
    let rest: Vec<String> = args.collect();
    match command.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "folders" => {
            if let Some(extra) = rest.first() {
                anyhow::bail!("unexpected argument: {extra}");
            }
            Ok(Command::Folders)
        }
        "files" => match rest.as_slice() {
            [] => Ok(Command::Files(None)),
            [folder_id] => Ok(Command::Files(Some(folder_id.clone()))),
            [_, extra, ..] => anyhow::bail!("unexpected argument: {extra}"),
        },
        "upload" => match rest.as_slice() {
            [folder_id, description, paths @ ..] if !paths.is_empty() => Ok(Command::Upload {
                folder_id: folder_id.clone(),
                description: description.clone(),
                paths: paths.iter().map(PathBuf::from).collect(),
            }),
            _ => anyhow::bail!("usage: folio upload FOLDER_ID DESCRIPTION PATH..."),
        },
        "delete" => match rest.as_slice() {
            [file_id] => Ok(Command::Delete(file_id.clone())),
            _ => anyhow::bail!("usage: folio delete FILE_ID"),
        },
        other => anyhow::bail!("unknown command: {other}"),
    }
}

fn print_usage() {
    println!("Usage: folio <command>");
    println!("  folders                               List folders with file counts");
    println!("  files [FOLDER_ID]                     List files, newest first");
    println!("  upload FOLDER_ID DESCRIPTION PATH...  Upload one or more files");
    println!("  delete FILE_ID                        Delete a file");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let command = parse_command(std::env::args())?;
    if command == Command::Help {
        print_usage();
        return Ok(());
    }

    logger::init()?;
    let config = DocsConfig::from_env();
    let client = FolioClient::with_base_url(&config.api_url, config.require_token()?)
        .with_context(|| format!("invalid FOLIO_API_URL: {}", config.api_url))?;
    let hub = DocumentHub::new(Arc::new(client), config.cache);

    match command {
        Command::Folders => {
            for folder in hub.coordinator().refresh_folders().await? {
                println!(
                    "{}\t{}\t{} files\t{} bytes",
                    folder.id, folder.name, folder.file_count, folder.total_size_bytes
                );
            }
        }
        Command::Files(folder_id) => {
            let filter = folder_id.map_or(Filter::All, Filter::Folder);
            if filter != Filter::All {
                hub.coordinator().refresh_folders().await?;
            }
            hub.state().view.write().await.set_filter(filter);
            hub.coordinator().reload_now().await?;
            for file in hub.documents().await.iter() {
                println!(
                    "{}\t{}\t{}\t{} bytes\t{}",
                    file.id, file.folder_name, file.name, file.size_bytes, file.mime_type
                );
            }
        }
        Command::Upload {
            folder_id,
            description,
            paths,
        } => {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                let file = UploadFile::from_path(path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                files.push(file);
            }
            let outcome = hub.uploads().upload(files, &folder_id, &description).await;
            for record in &outcome.succeeded {
                println!("uploaded\t{}\t{}", record.id, record.name);
            }
            for failure in &outcome.failed {
                println!("failed\t{}\t{}", failure.file_name, failure.error);
            }
            println!("{}", outcome.summary());
            if outcome.is_total_failure() {
                anyhow::bail!("no file was uploaded");
            }
        }
        Command::Delete(file_id) => {
            hub.uploads().delete_file(&file_id).await?;
            println!("deleted {file_id}");
        }
        Command::Help => {}
    }
    Ok(())
}
