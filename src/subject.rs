use std::fmt;

use clap::ValueEnum;

/// Content category of the ratings being dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Subject {
    Films,
    Books,
    Games,
    #[value(alias = "serials")]
    Series,
}

impl Subject {
    /// Path segment the site uses for this category.
    pub fn slug(self) -> &'static str {
        match self {
            Subject::Films => "films",
            Subject::Books => "books",
            Subject::Games => "games",
            Subject::Series => "serials",
        }
    }

    /// Search sites linked from the report for this category.
    pub fn targets(self) -> &'static [Target] {
        match self {
            Subject::Films | Subject::Series => &[Target::Kinopoisk],
            Subject::Books => &[Target::Goodreads, Target::Livelib],
            Subject::Games => &[],
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Kinopoisk,
    Goodreads,
    Livelib,
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Target::Kinopoisk => "Kinopoisk",
            Target::Goodreads => "Goodreads",
            Target::Livelib => "Livelib",
        }
    }

    fn template(self) -> &'static str {
        match self {
            Target::Kinopoisk => "http://www.kinopoisk.ru/index.php?first=no&what=&kp_query={term}",
            Target::Goodreads => {
                "https://www.goodreads.com/search?utf8=%E2%9C%93&q={term}&search_type=books"
            }
            Target::Livelib => "http://www.livelib.ru/find/{term}/all",
        }
    }

    pub fn search_url(self, term: &str) -> String {
        self.template()
            .replace("{term}", &urlencoding::encode(term))
    }
}
