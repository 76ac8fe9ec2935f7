use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use song_library::cache::CacheType;
use song_library::config::{AppConfig, CliConfig, FileConfig};
use song_library::{Library, SearchParams, Song};
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid RFC 3339 time: {}", s))?
        .with_timezone(&Utc))
}

#[derive(Parser, Debug)]
#[clap(name = "library-cli", about = "Manage and search a song library")]
struct CliArgs {
    /// Directory holding library.db and cache.db.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override command-line options.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Maximum number of songs returned by a search.
    #[clap(long, global = true)]
    pub max_results: Option<usize>,

    /// Disable all caches.
    #[clap(long, global = true)]
    pub no_cache: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert or update songs from a JSON array of songs.
    Import {
        #[clap(value_parser = parse_path)]
        file: PathBuf,

        /// Replace ratings, tags and play history of existing songs.
        #[clap(long)]
        replace_user_data: bool,
    },
    /// Search for songs and print them as JSON.
    Search(SearchArgs),
    /// Record a play of a song.
    Play {
        id: i64,

        /// Start time of the play (RFC 3339). Defaults to now.
        #[clap(long, value_parser = parse_time)]
        time: Option<DateTime<Utc>>,

        #[clap(long, default_value = "127.0.0.1")]
        ip: String,
    },
    /// Set a song's rating and/or tags.
    Rate {
        id: i64,

        /// Rating from 1 to 5, or 0 to clear it.
        #[clap(long)]
        rating: Option<u8>,

        /// Space-separated tags replacing the song's current ones.
        #[clap(long)]
        tags: Option<String>,
    },
    /// Delete a song and its plays.
    Delete { id: i64 },
    /// List every tag in use.
    Tags {
        /// Fail instead of scanning the library when tags aren't cached.
        #[clap(long)]
        require_cache: bool,
    },
    /// Drop cached queries and tags.
    Flush {
        /// Only flush this tier ("fast" or "durable").
        #[clap(long)]
        tier: Option<CacheType>,
    },
    /// Re-derive the search fields of every song.
    Reindex,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[clap(long)]
    artist: Option<String>,
    #[clap(long)]
    title: Option<String>,
    #[clap(long)]
    album: Option<String>,
    #[clap(long)]
    album_id: Option<String>,
    /// Space-separated keywords.
    #[clap(long)]
    keywords: Option<String>,
    /// Space-separated tags; prefix a tag with '-' to exclude it.
    #[clap(long, allow_hyphen_values = true)]
    tags: Option<String>,
    #[clap(long)]
    min_rating: Option<u8>,
    #[clap(long)]
    unrated: bool,
    #[clap(long)]
    max_plays: Option<i64>,
    #[clap(long, value_parser = parse_time)]
    min_first_played: Option<DateTime<Utc>>,
    #[clap(long, value_parser = parse_time)]
    max_last_played: Option<DateTime<Utc>>,
    #[clap(long)]
    first_track: bool,
    #[clap(long)]
    max_disc: Option<i64>,
    #[clap(long)]
    shuffle: bool,
    #[clap(long)]
    order_by_last_played: bool,
    /// Only return cached results.
    #[clap(long)]
    cache_only: bool,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        SearchParams {
            artist: args.artist,
            title: args.title,
            album: args.album,
            album_id: args.album_id,
            keywords: args.keywords,
            tags: args.tags,
            min_rating: args.min_rating,
            unrated: args.unrated,
            max_plays: args.max_plays,
            min_first_played: args.min_first_played,
            max_last_played: args.max_last_played,
            first_track: args.first_track,
            max_disc: args.max_disc,
            shuffle: args.shuffle,
            order_by_last_played: args.order_by_last_played,
            cache_only: args.cache_only,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        max_results: cli_args.max_results,
        no_cache: cli_args.no_cache,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;
    let library = Library::open(&config)?;

    match cli_args.command {
        Command::Import {
            file,
            replace_user_data,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let songs: Vec<Song> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse songs from {:?}", file))?;
            for song in &songs {
                if song.sha1.is_empty() {
                    bail!("Song {:?} has no SHA1", song.filename);
                }
                library.updater.update_or_insert_song(song, replace_user_data)?;
            }
            info!("Imported {} song(s)", songs.len());
        }
        Command::Search(args) => {
            let songs = library.searcher.search_params(&args.into()).await?;
            println!("{}", serde_json::to_string_pretty(&songs)?);
        }
        Command::Play { id, time, ip } => {
            let start_time = time.unwrap_or_else(Utc::now);
            if !library.updater.add_play(id, start_time, &ip)? {
                info!("Play was already recorded");
            }
        }
        Command::Rate { id, rating, tags } => {
            if rating.is_none() && tags.is_none() {
                bail!("Nothing to change: pass --rating and/or --tags");
            }
            let tags = tags.map(|t| t.split_whitespace().map(str::to_string).collect());
            let changed = library.updater.set_rating_and_tags(id, rating, tags)?;
            info!("Updated song {}: {}", id, changed);
        }
        Command::Delete { id } => library.updater.delete_song(id)?,
        Command::Tags { require_cache } => {
            for tag in library.searcher.tags(require_cache).await? {
                println!("{}", tag);
            }
        }
        Command::Flush { tier } => library.searcher.flush_caches(tier)?,
        Command::Reindex => {
            let (scanned, updated) = library.updater.reindex_songs()?;
            info!("Reindexed {} song(s), {} updated", scanned, updated);
        }
    }

    Ok(())
}
