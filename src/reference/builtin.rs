use phf::{phf_map, phf_set};

pub(super) const DISPOSABLE_DOMAINS: phf::Set<&'static str> = phf_set! {
    "10minutemail.com",
    "20minutemail.com",
    "burnermail.io",
    "discard.email",
    "dispostable.com",
    "emailondeck.com",
    "fakeinbox.com",
    "getairmail.com",
    "getnada.com",
    "guerrillamail.com",
    "guerrillamail.net",
    "guerrillamailblock.com",
    "jetable.org",
    "mailcatch.com",
    "maildrop.cc",
    "mailinator.com",
    "mailnesia.com",
    "mintemail.com",
    "mohmal.com",
    "mytemp.email",
    "sharklasers.com",
    "spamgourmet.com",
    "tempail.com",
    "temp-mail.org",
    "tempmail.com",
    "tempmailo.com",
    "throwawaymail.com",
    "trash-mail.com",
    "trashmail.com",
    "yopmail.com",
    "yopmail.fr",
};

pub(super) const FREE_PROVIDERS: phf::Set<&'static str> = phf_set! {
    "aol.com",
    "free.fr",
    "gmail.com",
    "gmx.com",
    "gmx.de",
    "gmx.fr",
    "googlemail.com",
    "hotmail.com",
    "hotmail.co.uk",
    "hotmail.fr",
    "icloud.com",
    "laposte.net",
    "live.com",
    "live.fr",
    "mail.com",
    "mail.ru",
    "me.com",
    "msn.com",
    "orange.fr",
    "outlook.com",
    "outlook.fr",
    "proton.me",
    "protonmail.com",
    "sfr.fr",
    "wanadoo.fr",
    "web.de",
    "yahoo.com",
    "yahoo.co.uk",
    "yahoo.fr",
    "yandex.com",
    "yandex.ru",
    "ymail.com",
    "zoho.com",
};

pub(super) const ROLE_ACCOUNTS: phf::Set<&'static str> = phf_set! {
    "abuse",
    "accounting",
    "admin",
    "administrator",
    "billing",
    "careers",
    "contact",
    "enquiries",
    "hello",
    "help",
    "helpdesk",
    "hostmaster",
    "hr",
    "info",
    "jobs",
    "marketing",
    "office",
    "postmaster",
    "press",
    "privacy",
    "sales",
    "security",
    "support",
    "team",
    "webmaster",
};

pub(super) const NO_REPLY: phf::Set<&'static str> = phf_set! {
    "bounce",
    "bounces",
    "do-not-reply",
    "do_not_reply",
    "donotreply",
    "mailer-daemon",
    "no-reply",
    "no_reply",
    "noreply",
    "notifications",
};

/// Matched against the domain and each of its parent domains.
pub(super) const GOVERNMENT_SUFFIXES: phf::Set<&'static str> = phf_set! {
    "gov",
    "mil",
    "gov.au",
    "gov.br",
    "gov.in",
    "gov.uk",
    "gov.za",
    "gob.mx",
    "gob.es",
    "go.jp",
    "gc.ca",
    "gouv.fr",
    "gv.at",
    "admin.ch",
    "bund.de",
    "europa.eu",
};

pub(super) const TYPO_DOMAINS: phf::Map<&'static str, &'static str> = phf_map! {
    "gamil.com" => "gmail.com",
    "gmai.com" => "gmail.com",
    "gmail.co" => "gmail.com",
    "gmail.con" => "gmail.com",
    "gmial.com" => "gmail.com",
    "gnail.com" => "gmail.com",
    "hotmail.con" => "hotmail.com",
    "hotmal.com" => "hotmail.com",
    "hotmial.com" => "hotmail.com",
    "hotnail.com" => "hotmail.com",
    "outlok.com" => "outlook.com",
    "outlook.con" => "outlook.com",
    "yahoo.con" => "yahoo.com",
    "yaho.com" => "yahoo.com",
    "yahooo.com" => "yahoo.com",
    "laposte.fr" => "laposte.net",
    "icloud.co" => "icloud.com",
};

/// Targets for edit-distance suggestions.
pub(super) const KNOWN_PROVIDERS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "icloud.com",
    "aol.com",
    "live.com",
    "msn.com",
    "orange.fr",
    "wanadoo.fr",
    "laposte.net",
    "free.fr",
    "sfr.fr",
    "protonmail.com",
    "yandex.ru",
    "mail.ru",
    "gmx.de",
    "web.de",
];

/// MX host suffixes of large mailbox providers and email service providers.
pub(super) const ISP_ESP_MX_SUFFIXES: phf::Set<&'static str> = phf_set! {
    "google.com",
    "googlemail.com",
    "outlook.com",
    "hotmail.com",
    "yahoodns.net",
    "icloud.com",
    "me.com",
    "zoho.com",
    "protonmail.ch",
    "pphosted.com",
    "mimecast.com",
    "messagelabs.com",
    "barracudanetworks.com",
    "secureserver.net",
    "ovh.net",
    "gandi.net",
    "orange.fr",
    "free.fr",
    "mailgun.org",
    "sendgrid.net",
    "amazonses.com",
    "amazonaws.com",
};
