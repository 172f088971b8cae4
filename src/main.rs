#[rocket::launch]
fn rocket() -> _ {
    campus_api::rocket()
}
