fn main() {
    soundmaster_live_lib::run()
}
