use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};

use serde::Deserialize;
use distgram_core::io::list_corpora;
use distgram_core::model::config::{CompletionInput, ModelConfig, StartSeed};
use distgram_core::model::generator::Generator;
use distgram_core::model::relation_model::RelationModel;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// `[server]` table of the configuration file.
#[derive(Deserialize)]
#[serde(default)]
struct ServerSettings {
	host: String,
	port: u16,
	data_dir: String,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self { host: "127.0.0.1".to_owned(), port: 5000, data_dir: "./data".to_owned() }
	}
}

#[derive(Deserialize, Default)]
struct ServerFile {
	#[serde(default)]
	server: ServerSettings,
}

/// Query parameters of `/v1/next`
#[derive(Deserialize)]
struct NextParams {
	context: String,
	limit: Option<usize>,
}

/// Query parameters of `/v1/complete`
#[derive(Deserialize)]
struct CompleteParams {
	seed: String,
	length: Option<usize>,
	limit: Option<usize>,
	random: Option<bool>,
}

/// Query parameters of `/v1/generate`
#[derive(Deserialize)]
struct GenerateParams {
	length: Option<usize>,
	limit: Option<usize>,
	random: Option<bool>,
	seed: Option<String> // -> random, model or custom(str)
}

#[derive(Deserialize)]
struct ModelQuery {
	names: Option<String>
}

struct SharedData {
	generator: Generator,
	config: ModelConfig,
	data_dir: String,
}

fn completion_input(length: Option<usize>, limit: Option<usize>, random: Option<bool>) -> CompletionInput {
	let defaults = CompletionInput::default();
	CompletionInput::new(
		length.unwrap_or(defaults.length),
		limit.unwrap_or(defaults.limit),
		random.unwrap_or(defaults.random),
	)
}

impl GenerateParams {
	/// Determines the starting seed strategy for generation.
	fn start_seed(&self) -> Result<StartSeed, String> {
		match &self.seed {
			None => Ok(StartSeed::Random),
			Some(s) if s.eq_ignore_ascii_case("random") => Ok(StartSeed::Random),
			Some(s) if s.eq_ignore_ascii_case("model") => Ok(StartSeed::FromModel),
			Some(s) if s.to_lowercase().starts_with("custom:") => {
				let value = &s["custom:".len()..];
				if value.is_empty() {
					Err("Custom seed cannot be empty".into())
				} else {
					Ok(StartSeed::Custom(value.to_owned()))
				}
			}
			Some(_) => Err("Seed must be 'random', 'model' or start with 'custom:'".into()),
		}
	}
}

/// HTTP GET endpoint `/v1/next`
///
/// Returns the ranked candidate tokens, one per line.
#[get("/v1/next")]
async fn get_next(data: web::Data<Mutex<SharedData>>, query: web::Query<NextParams>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let limit = query.limit.unwrap_or(CompletionInput::default().limit);
	HttpResponse::Ok().body(shared_data.generator.next(&query.context, limit).join("\n"))
}

/// HTTP GET endpoint `/v1/complete`
#[get("/v1/complete")]
async fn get_completed(data: web::Data<Mutex<SharedData>>, query: web::Query<CompleteParams>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let input = completion_input(query.length, query.limit, query.random);
	HttpResponse::Ok().body(shared_data.generator.complete(&query.seed, &input))
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates text from a seed strategy based on query parameters.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let start_seed = match query.start_seed() {
		Ok(s) => s,
		Err(e) => return HttpResponse::BadRequest().body(e)
	};

	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	let input = completion_input(query.length, query.limit, query.random);
	HttpResponse::Ok().body(shared_data.generator.generate_from(&start_seed, &input))
}

/// HTTP PUT endpoint `/v1/train`
///
/// Trains the request body as a single fragment.
#[put("/v1/train")]
async fn put_train(data: web::Data<Mutex<SharedData>>, body: String) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	shared_data.generator.train(&body);
	HttpResponse::Ok().body("Text trained successfully")
}

#[get("/v1/models")]
async fn get_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let data_dir = match data.lock() {
		Ok(m) => m.data_dir.clone(),
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match list_corpora(&data_dir) {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list models")
	}
}

#[get("/v1/loaded_models")]
async fn get_loaded_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	HttpResponse::Ok().body(shared_data.generator.model_names().join("\n"))
}

/// HTTP PUT endpoint `/v1/load_models`
///
/// Replaces the generator with one built from the named corpora.
#[put("/v1/load_models")]
async fn put_model(data: web::Data<Mutex<SharedData>>, query: web::Query<ModelQuery>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty model name"),
	};

	let model = match RelationModel::new(shared_data.config.clone()) {
		Ok(m) => m,
		Err(e) => return HttpResponse::InternalServerError().body(format!("Invalid configuration: {e}")),
	};
	let mut generator = Generator::new(model);

	for name in query_names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
		let corpus_path = format!("{}/{}.dat", shared_data.data_dir, name);
		if let Err(e) = generator.load_corpus(&corpus_path) {
			error!(corpus = %corpus_path, error = %e, "failed to load corpus");
			return HttpResponse::InternalServerError().body(format!("Failed to load model: {e}"));
		}
	}

	shared_data.generator = generator;
	HttpResponse::Ok().body("Models loaded successfully")
}

/// Main entry point for the server.
///
/// Reads an optional TOML configuration file given as first argument
/// (model options at top level, `[server]` table for the bind address and
/// corpus folder), wraps an empty generator in a `Mutex` and starts an
/// Actix-web HTTP server.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let (config, settings) = match std::env::args().nth(1) {
		Some(path) => {
			let input = std::fs::read_to_string(&path)?;
			let config = ModelConfig::from_toml_str(&input)
				.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
			let file: ServerFile = toml::from_str(&input)
				.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
			(config, file.server)
		}
		None => (ModelConfig::default(), ServerSettings::default()),
	};

	let model = RelationModel::new(config.clone())
		.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
	let shared_data = SharedData {
		generator: Generator::new(model),
		config,
		data_dir: settings.data_dir,
	};
	let shared_model = web::Data::new(Mutex::new(shared_data));

	info!(host = %settings.host, port = settings.port, "starting server");
	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_model.clone())
			.service(get_next)
			.service(get_completed)
			.service(get_generated)
			.service(put_train)
			.service(get_models)
			.service(put_model)
			.service(get_loaded_models)
	})
		.bind((settings.host.as_str(), settings.port))?
		.run()
		.await
}
