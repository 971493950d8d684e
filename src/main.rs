use rocket::{Build, Rocket};
use staygate::Config;

#[rocket::launch]
fn rocket() -> Rocket<Build> {
    dotenvy::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    match staygate::assemble_rocket(config) {
        Ok(rocket) => rocket,
        Err(e) => {
            eprintln!("failed to build the server: {e}");
            std::process::exit(1);
        }
    }
}
